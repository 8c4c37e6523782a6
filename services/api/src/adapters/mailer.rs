//! services/api/src/adapters/mailer.rs
//!
//! Adapters for the `MailService` port: an SMTP mailer built on `lettre`, and a
//! logging mailer used when no SMTP relay is configured.

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use study_assistant_core::domain::CodePurpose;
use study_assistant_core::ports::{MailService, PortError, PortResult};
use tracing::{info, warn};

use crate::config::SmtpConfig;

/// Subject line and plain-text body of a verification email.
fn compose(code: &str, purpose: CodePurpose, ttl_minutes: i64) -> (&'static str, String) {
    let (subject, intro) = match purpose {
        CodePurpose::Signup => (
            "Welcome to StudyHelp - Verify Your Account",
            "Thanks for signing up for StudyHelp! Use the code below to verify your account.",
        ),
        CodePurpose::Login => (
            "StudyHelp Login Code",
            "Use the code below to sign in to StudyHelp.",
        ),
    };
    let body = format!(
        "{}\n\n    {}\n\nThis code expires in {} minutes. If you didn't request it, you can ignore this email.\n",
        intro, code, ttl_minutes
    );
    (subject, body)
}

//=========================================================================================
// SMTP Adapter
//=========================================================================================

#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    code_ttl_minutes: i64,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig, from: &str, code_ttl_minutes: i64) -> PortResult<Self> {
        let from = from
            .parse::<Mailbox>()
            .map_err(|e| PortError::InvalidInput(format!("MAIL_FROM is not a valid mailbox: {}", e)))?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();
        Ok(Self {
            transport,
            from,
            code_ttl_minutes,
        })
    }
}

#[async_trait]
impl MailService for SmtpMailer {
    async fn send_verification_code(
        &self,
        email: &str,
        code: &str,
        purpose: CodePurpose,
    ) -> PortResult<()> {
        let to = email
            .parse::<Mailbox>()
            .map_err(|e| PortError::InvalidInput(format!("Invalid email address: {}", e)))?;
        let (subject, body) = compose(code, purpose, self.code_ttl_minutes);

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        self.transport.send(message).await.map_err(|e| {
            warn!("Failed to deliver verification email: {}", e);
            PortError::Upstream(format!("Failed to send verification email: {}", e))
        })?;
        info!(purpose = purpose.as_str(), "Verification email sent.");
        Ok(())
    }
}

//=========================================================================================
// Logging Adapter
//=========================================================================================

/// Writes codes to the log instead of sending them. Development only.
#[derive(Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl MailService for LogMailer {
    async fn send_verification_code(
        &self,
        email: &str,
        code: &str,
        purpose: CodePurpose,
    ) -> PortResult<()> {
        let (subject, _) = compose(code, purpose, 0);
        info!(%email, %code, subject, "SMTP is not configured; verification code logged instead of sent.");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subjects_depend_on_purpose() {
        assert_eq!(
            compose("123456", CodePurpose::Signup, 10).0,
            "Welcome to StudyHelp - Verify Your Account"
        );
        assert_eq!(compose("123456", CodePurpose::Login, 10).0, "StudyHelp Login Code");
    }

    #[test]
    fn body_carries_code_and_expiry() {
        let (_, body) = compose("654321", CodePurpose::Login, 10);
        assert!(body.contains("654321"));
        assert!(body.contains("10 minutes"));
    }
}
