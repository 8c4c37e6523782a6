//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use axum::http::HeaderValue;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use std::ops::RangeInclusive;
use study_assistant_core::verification::{DEFAULT_CODE_TTL_MINUTES, MAX_CODE_TTL_MINUTES};
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Where documents, artifacts and accounts are stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    /// Process-local storage; everything is lost on restart.
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(format!("'{}' is not one of postgres, memory", other)),
        }
    }
}

/// SMTP relay settings for sending verification codes.
#[derive(Clone, Debug)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub storage: StorageBackend,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub log_level: Level,
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub llm_model: String,
    pub llm_timeout: Duration,
    pub max_content_chars: usize,
    pub cors_origin: HeaderValue,
    pub smtp: Option<SmtpConfig>,
    pub mail_from: String,
    pub verification_code_ttl: chrono::Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 3000)),
            storage: StorageBackend::Postgres,
            database_url: None,
            database_max_connections: 5,
            log_level: Level::INFO,
            openai_api_key: None,
            openai_base_url: None,
            llm_model: "gpt-4o-mini".to_string(),
            llm_timeout: Duration::from_secs(60),
            max_content_chars: 100_000,
            cors_origin: HeaderValue::from_static("http://localhost:3000"),
            smtp: None,
            mail_from: "StudyHelp <onboarding@studyhelp.local>".to_string(),
            verification_code_ttl: chrono::Duration::minutes(DEFAULT_CODE_TTL_MINUTES),
        }
    }
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        let defaults = Config::default();

        // --- Load Server and Storage Settings ---
        let bind_address = parse_var("BIND_ADDRESS", defaults.bind_address)?;
        let storage = parse_var("STORAGE", defaults.storage)?;
        let database_url = std::env::var("DATABASE_URL").ok();
        if storage == StorageBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::MissingVar("DATABASE_URL".to_string()));
        }
        let database_max_connections =
            parse_var("DATABASE_MAX_CONNECTIONS", defaults.database_max_connections)?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load Language Model Settings ---
        let openai_api_key = std::env::var("OPENAI_API_KEY").ok();
        let openai_base_url = std::env::var("OPENAI_BASE_URL").ok();
        let llm_model = std::env::var("LLM_MODEL").unwrap_or(defaults.llm_model);
        let llm_timeout = Duration::from_secs(parse_bounded_var(
            "LLM_TIMEOUT_SECS",
            defaults.llm_timeout.as_secs(),
            1..=MAX_LLM_TIMEOUT_SECS,
        )?);
        let max_content_chars = parse_var("MAX_CONTENT_CHARS", defaults.max_content_chars)?;

        let cors_origin = match std::env::var("CORS_ORIGIN") {
            Ok(origin) => HeaderValue::from_str(&origin).map_err(|e| {
                ConfigError::InvalidValue("CORS_ORIGIN".to_string(), e.to_string())
            })?,
            Err(_) => defaults.cors_origin,
        };

        // --- Load Mail Settings (SMTP is optional) ---
        let smtp = match std::env::var("SMTP_HOST") {
            Ok(host) => Some(SmtpConfig {
                host,
                port: parse_var("SMTP_PORT", 465u16)?,
                username: std::env::var("SMTP_USERNAME")
                    .map_err(|_| ConfigError::MissingVar("SMTP_USERNAME".to_string()))?,
                password: std::env::var("SMTP_PASSWORD")
                    .map_err(|_| ConfigError::MissingVar("SMTP_PASSWORD".to_string()))?,
            }),
            Err(_) => None,
        };
        let mail_from = std::env::var("MAIL_FROM").unwrap_or(defaults.mail_from);
        let verification_code_ttl = code_ttl(parse_bounded_var(
            "VERIFICATION_CODE_TTL_MINUTES",
            DEFAULT_CODE_TTL_MINUTES,
            1..=MAX_CODE_TTL_MINUTES,
        )?)?;

        Ok(Self {
            bind_address,
            storage,
            database_url,
            database_max_connections,
            log_level,
            openai_api_key,
            openai_base_url,
            llm_model,
            llm_timeout,
            max_content_chars,
            cors_origin,
            smtp,
            mail_from,
            verification_code_ttl,
        })
    }
}

const MAX_LLM_TIMEOUT_SECS: u64 = 10 * 60;

/// Like `parse_var`, but rejects values outside `range`.
fn parse_bounded_var<T>(name: &str, default: T, range: RangeInclusive<T>) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + std::fmt::Display,
    T::Err: std::fmt::Display,
{
    let value = parse_var(name, default)?;
    if !range.contains(&value) {
        return Err(ConfigError::InvalidValue(
            name.to_string(),
            format!(
                "{} is outside the allowed range {}..={}",
                value,
                range.start(),
                range.end()
            ),
        ));
    }
    Ok(value)
}

fn code_ttl(minutes: i64) -> Result<chrono::Duration, ConfigError> {
    chrono::Duration::try_minutes(minutes).ok_or_else(|| {
        ConfigError::InvalidValue(
            "VERIFICATION_CODE_TTL_MINUTES".to_string(),
            format!("{} minutes is not a representable duration", minutes),
        )
    })
}

/// Reads and parses an optional variable, using `default` when it is unset.
fn parse_var<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_backend_parses_case_insensitively() {
        assert_eq!("Memory".parse::<StorageBackend>(), Ok(StorageBackend::Memory));
        assert_eq!("postgresql".parse::<StorageBackend>(), Ok(StorageBackend::Postgres));
        assert!("sqlite".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn unset_variables_fall_back_to_defaults() {
        let value: u32 = parse_var("STUDY_ASSISTANT_TEST_UNSET_VARIABLE", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn out_of_range_values_are_invalid() {
        std::env::set_var("STUDY_ASSISTANT_TEST_ZERO_TIMEOUT", "0");
        std::env::set_var("STUDY_ASSISTANT_TEST_NEGATIVE_TTL", "-5");
        std::env::set_var("STUDY_ASSISTANT_TEST_IN_RANGE", "30");

        assert!(matches!(
            parse_bounded_var("STUDY_ASSISTANT_TEST_ZERO_TIMEOUT", 60u64, 1..=600),
            Err(ConfigError::InvalidValue(name, _)) if name == "STUDY_ASSISTANT_TEST_ZERO_TIMEOUT"
        ));
        assert!(matches!(
            parse_bounded_var("STUDY_ASSISTANT_TEST_NEGATIVE_TTL", 10i64, 1..=MAX_CODE_TTL_MINUTES),
            Err(ConfigError::InvalidValue(_, _))
        ));
        assert_eq!(
            parse_bounded_var("STUDY_ASSISTANT_TEST_IN_RANGE", 10i64, 1..=MAX_CODE_TTL_MINUTES).unwrap(),
            30
        );
    }

    #[test]
    fn huge_code_ttl_is_an_error_not_a_panic() {
        assert!(code_ttl(i64::MAX).is_err());
        assert_eq!(code_ttl(15).unwrap(), chrono::Duration::minutes(15));
    }

    #[test]
    fn from_env_rejects_an_overflowing_code_ttl() {
        std::env::set_var("STORAGE", "memory");
        std::env::set_var("RUST_LOG", "info");
        std::env::set_var("VERIFICATION_CODE_TTL_MINUTES", "9223372036854775807");

        let result = Config::from_env();
        std::env::remove_var("VERIFICATION_CODE_TTL_MINUTES");

        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue(name, _)) if name == "VERIFICATION_CODE_TTL_MINUTES"
        ));
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.bind_address.port(), 3000);
        assert_eq!(config.llm_timeout, Duration::from_secs(60));
        assert_eq!(config.verification_code_ttl, chrono::Duration::minutes(10));
        assert!(config.smtp.is_none());
    }
}
