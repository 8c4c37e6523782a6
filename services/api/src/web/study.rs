//! services/api/src/web/study.rs
//!
//! Flashcard study mode. A session holds a copy of a document's flashcards and
//! is driven one command at a time.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use std::sync::Arc;
use study_assistant_core::domain::FlashcardDraft;
use study_assistant_core::ports::PortError;
use study_assistant_core::study::{FlashcardStudy, StudyCommand};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{ApiError, ErrorBody};
use crate::web::protocol::{StudyCommandMessage, StudySnapshot};
use crate::web::rest::owned_document;
use crate::web::state::{AppState, StudySession};

/// Start studying the flashcards of a document.
#[utoipa::path(
    post,
    path = "/documents/{id}/study",
    params(("id" = Uuid, Path, description = "Document id")),
    responses(
        (status = 201, description = "Study session started on the first card", body = StudySnapshot),
        (status = 400, description = "The document has no flashcards", body = ErrorBody),
        (status = 404, description = "Document not found", body = ErrorBody)
    )
)]
pub async fn start_study_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(document_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let document = owned_document(&state, user_id, document_id).await?;
    let cards = state
        .db
        .list_flashcards(&[document.id])
        .await?
        .into_iter()
        .map(|f| FlashcardDraft {
            question: f.question,
            answer: f.answer,
        })
        .collect();
    let study =
        FlashcardStudy::new(cards).map_err(|e| PortError::InvalidInput(e.to_string()))?;

    let snapshot_template = StudySnapshot::capture(Uuid::nil(), document.id, &document.title, &study);
    let session_id = state
        .study_sessions
        .insert(StudySession {
            user_id,
            document_id: document.id,
            document_title: document.title,
            study,
        })
        .await;
    info!(%session_id, document_id = %document_id, cards = snapshot_template.total, "Study session started.");

    Ok((
        StatusCode::CREATED,
        Json(StudySnapshot {
            session_id,
            ..snapshot_template
        }),
    ))
}

/// Apply one command to a study session.
#[utoipa::path(
    post,
    path = "/study/{session_id}/commands",
    params(("session_id" = Uuid, Path, description = "Study session id")),
    request_body = StudyCommandMessage,
    responses(
        (status = 200, description = "The session after the command", body = StudySnapshot),
        (status = 404, description = "Study session not found", body = ErrorBody)
    )
)]
pub async fn study_command_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(session_id): Path<Uuid>,
    Json(message): Json<StudyCommandMessage>,
) -> Result<impl IntoResponse, ApiError> {
    let command = StudyCommand::from(message);
    let snapshot = state
        .study_sessions
        .with_session(session_id, user_id, |session| {
            session.study.apply(command);
            StudySnapshot::capture(
                session_id,
                session.document_id,
                &session.document_title,
                &session.study,
            )
        })
        .await?;
    debug!(%session_id, ?command, index = snapshot.index, "Study command applied.");
    Ok(Json(snapshot))
}
