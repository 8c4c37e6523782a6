//! crates/study_assistant_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    ArtifactKind, CodePurpose, Document, Flashcard, PracticeQuestion, StudyMaterials, Summary,
    User, UserCredentials, VerificationCode,
};
use crate::intake::NewDocument;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Upstream service failed: {0}")]
    Upstream(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- User Management ---
    /// Fails with `Conflict` when the email is already registered.
    async fn create_user(&self, email: &str, hashed_password: Option<&str>) -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<User>;

    async fn get_credentials_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    // --- Auth Sessions ---
    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    /// Returns the owning user of an unexpired session.
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;

    // --- Document Management ---
    async fn create_document(&self, user_id: Uuid, document: &NewDocument) -> PortResult<Document>;

    async fn get_document_by_id(&self, document_id: Uuid) -> PortResult<Document>;

    /// Newest first.
    async fn list_documents(&self, user_id: Uuid) -> PortResult<Vec<Document>>;

    /// Removes the document together with every artifact derived from it.
    async fn delete_document(&self, document_id: Uuid) -> PortResult<()>;

    // --- Artifacts ---
    /// Atomically replaces all artifacts of a document with `materials`.
    async fn replace_study_materials(
        &self,
        document_id: Uuid,
        materials: &StudyMaterials,
    ) -> PortResult<()>;

    /// Newest first.
    async fn list_summaries(&self, document_ids: &[Uuid]) -> PortResult<Vec<Summary>>;

    async fn list_flashcards(&self, document_ids: &[Uuid]) -> PortResult<Vec<Flashcard>>;

    async fn list_practice_questions(
        &self,
        document_ids: &[Uuid],
    ) -> PortResult<Vec<PracticeQuestion>>;

    // --- Verification Codes ---
    async fn insert_verification_code(
        &self,
        email: &str,
        code: &str,
        purpose: CodePurpose,
        expires_at: DateTime<Utc>,
    ) -> PortResult<VerificationCode>;

    /// Marks a matching, unused, unexpired code as used and returns it.
    /// Fails with `NotFound` when no such code exists. Only one caller can
    /// redeem a given code.
    async fn redeem_verification_code(
        &self,
        email: &str,
        code: &str,
        purpose: CodePurpose,
        now: DateTime<Utc>,
    ) -> PortResult<VerificationCode>;
}

/// A single prompt sent to the language model.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub artifact: ArtifactKind,
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
}

#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Returns the text content of the model's reply.
    async fn complete(&self, request: &CompletionRequest) -> PortResult<String>;
}

#[async_trait]
pub trait MailService: Send + Sync {
    /// Delivers a verification code to `email`.
    async fn send_verification_code(
        &self,
        email: &str,
        code: &str,
        purpose: CodePurpose,
    ) -> PortResult<()>;
}
