//! services/api/src/web/generation.rs
//!
//! Handlers that run the generation gateway: the public guest endpoint, which
//! only returns the materials, and the authenticated endpoint that also stores
//! them against a document.

use axum::{extract::State, response::IntoResponse, Extension, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use study_assistant_core::domain::{FlashcardDraft, PracticeQuestionDraft, StudyMaterials};
use study_assistant_core::intake::check_content_length;
use study_assistant_core::ports::PortError;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{ApiError, ErrorBody};
use crate::web::rest::owned_document;
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct GenerateRequest {
    #[serde(default)]
    pub content: String,
    pub title: Option<String>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProcessDocumentRequest {
    pub document_id: Uuid,
    /// Overrides the stored document text when present.
    pub content: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema, Clone)]
pub struct FlashcardDto {
    pub question: String,
    pub answer: String,
}

#[derive(Serialize, Deserialize, ToSchema, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PracticeQuestionDto {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub explanation: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StudyMaterialsResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<Uuid>,
    pub summary: String,
    pub flashcards: Vec<FlashcardDto>,
    pub practice_questions: Vec<PracticeQuestionDto>,
    /// Artifact kinds replaced with placeholder content because the model
    /// output could not be parsed.
    pub fallbacks: Vec<String>,
}

impl From<FlashcardDraft> for FlashcardDto {
    fn from(card: FlashcardDraft) -> Self {
        Self {
            question: card.question,
            answer: card.answer,
        }
    }
}

impl From<PracticeQuestionDraft> for PracticeQuestionDto {
    fn from(q: PracticeQuestionDraft) -> Self {
        Self {
            question: q.question,
            options: q.options,
            correct_answer: q.correct_answer,
            explanation: q.explanation,
        }
    }
}

impl StudyMaterialsResponse {
    fn new(document_id: Option<Uuid>, materials: StudyMaterials) -> Self {
        Self {
            document_id,
            summary: materials.summary,
            flashcards: materials.flashcards.into_iter().map(Into::into).collect(),
            practice_questions: materials
                .practice_questions
                .into_iter()
                .map(Into::into)
                .collect(),
            fallbacks: materials.fallbacks.iter().map(ToString::to_string).collect(),
        }
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// Generate study materials without storing them (guest mode).
#[utoipa::path(
    post,
    path = "/functions/generate-study-materials",
    request_body = GenerateRequest,
    responses(
        (status = 200, description = "Summary, flashcards and practice questions", body = StudyMaterialsResponse),
        (status = 400, description = "Content missing or too long", body = ErrorBody),
        (status = 502, description = "The language model failed or timed out", body = ErrorBody)
    )
)]
pub async fn generate_study_materials_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenerateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    check_content_length(&req.content, state.config.max_content_chars).map_err(PortError::from)?;
    let materials = state
        .generator
        .generate(req.title.as_deref(), &req.content)
        .await?;
    Ok(Json(StudyMaterialsResponse::new(None, materials)))
}

/// Generate study materials for one of the caller's documents and store them,
/// replacing whatever was generated for it before.
#[utoipa::path(
    post,
    path = "/functions/process-document",
    request_body = ProcessDocumentRequest,
    responses(
        (status = 200, description = "Materials generated and saved", body = StudyMaterialsResponse),
        (status = 400, description = "Content missing or too long", body = ErrorBody),
        (status = 401, description = "Not signed in", body = ErrorBody),
        (status = 404, description = "Document not found", body = ErrorBody),
        (status = 409, description = "Generation already running for this document", body = ErrorBody),
        (status = 502, description = "The language model failed or timed out", body = ErrorBody)
    )
)]
pub async fn process_document_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<ProcessDocumentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let document = owned_document(&state, user_id, req.document_id).await?;

    let _permit = state.in_flight.try_acquire(document.id)?;

    let content = req
        .content
        .filter(|c| !c.trim().is_empty())
        .unwrap_or(document.content);
    check_content_length(&content, state.config.max_content_chars).map_err(PortError::from)?;

    let materials = state
        .generator
        .generate(Some(&document.title), &content)
        .await?;
    state
        .db
        .replace_study_materials(document.id, &materials)
        .await?;

    info!(
        document_id = %document.id,
        flashcards = materials.flashcards.len(),
        practice_questions = materials.practice_questions.len(),
        "Study materials saved."
    );
    Ok(Json(StudyMaterialsResponse::new(Some(document.id), materials)))
}
