//! crates/study_assistant_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database; the ones that leave the service
//! as JSON derive `Serialize`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// Represents a user - used throughout app
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub user_id: Uuid,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

// Only used internally for login/signup - contains sensitive data.
// Accounts created through the email-code flow have no password.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: Option<String>,
}

/// A piece of study content submitted by a user, either pasted or uploaded.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub content: String,
    pub file_name: Option<String>,
    pub file_type: String,
    pub file_size: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// A generated summary of a document.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub id: Uuid,
    pub document_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Flashcard {
    pub id: Uuid,
    pub document_id: Uuid,
    pub question: String,
    pub answer: String,
}

/// A multiple-choice question. `options` always holds four entries and
/// `correct_answer` is one of them verbatim.
#[derive(Debug, Clone, Serialize)]
pub struct PracticeQuestion {
    pub id: Uuid,
    pub document_id: Uuid,
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub explanation: String,
}

/// A flashcard that has been generated but not yet stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlashcardDraft {
    pub question: String,
    pub answer: String,
}

/// A practice question that has been generated but not yet stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PracticeQuestionDraft {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub explanation: String,
}

/// The three kinds of artifact derived from a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Summary,
    Flashcards,
    PracticeQuestions,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArtifactKind::Summary => "summary",
            ArtifactKind::Flashcards => "flashcards",
            ArtifactKind::PracticeQuestions => "practice_questions",
        };
        f.write_str(name)
    }
}

/// Everything the generation gateway produces for one piece of content.
///
/// `fallbacks` lists the artifact kinds whose model output could not be parsed
/// and were replaced with placeholder content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudyMaterials {
    pub summary: String,
    pub flashcards: Vec<FlashcardDraft>,
    pub practice_questions: Vec<PracticeQuestionDraft>,
    pub fallbacks: Vec<ArtifactKind>,
}

/// What a verification code may be exchanged for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CodePurpose {
    Signup,
    Login,
}

impl CodePurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodePurpose::Signup => "signup",
            CodePurpose::Login => "login",
        }
    }
}

impl FromStr for CodePurpose {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "signup" => Ok(CodePurpose::Signup),
            "login" => Ok(CodePurpose::Login),
            other => Err(format!("unknown verification type '{}'", other)),
        }
    }
}

/// A short-lived numeric code sent by email.
#[derive(Debug, Clone)]
pub struct VerificationCode {
    pub id: Uuid,
    pub email: String,
    pub code: String,
    pub purpose: CodePurpose,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    /// Wrong guesses made against this code's email and purpose while it was outstanding.
    pub failed_attempts: i32,
}
