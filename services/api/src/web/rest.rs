//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the document and dashboard endpoints and the
//! master definition for the OpenAPI specification.

use crate::error::{ApiError, ErrorBody};
use crate::web::{auth, generation, protocol, state::AppState, study};
use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use study_assistant_core::dashboard::{DashboardTab, DashboardView};
use study_assistant_core::domain::{Document, StudyMaterials};
use study_assistant_core::intake::NewDocument;
use study_assistant_core::parsing::{validate_flashcard, validate_practice_question};
use study_assistant_core::ports::PortError;
use tracing::{error, info};
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        create_document_handler,
        upload_document_handler,
        import_document_handler,
        list_documents_handler,
        get_document_handler,
        delete_document_handler,
        dashboard_handler,
        generation::generate_study_materials_handler,
        generation::process_document_handler,
        study::start_study_handler,
        study::study_command_handler,
        auth::signup_handler,
        auth::login_handler,
        auth::logout_handler,
        auth::send_code_handler,
        auth::verify_code_handler,
    ),
    components(
        schemas(
            ErrorBody,
            HealthResponse,
            CreateDocumentRequest,
            ImportDocumentRequest,
            DocumentResponse,
            DocumentDetailResponse,
            generation::GenerateRequest,
            generation::ProcessDocumentRequest,
            generation::FlashcardDto,
            generation::PracticeQuestionDto,
            generation::StudyMaterialsResponse,
            protocol::StudyCommandMessage,
            protocol::StudySnapshot,
            auth::SignupRequest,
            auth::LoginRequest,
            auth::AuthResponse,
            auth::SendCodeRequest,
            auth::VerifyCodeRequest,
            auth::CodeResponse,
        )
    ),
    tags(
        (name = "Study Assistant API", description = "Generate summaries, flashcards and practice questions from study material.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateDocumentRequest {
    pub title: Option<String>,
    #[serde(default)]
    pub content: String,
}

/// A guest-generated result being saved to the caller's account.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImportDocumentRequest {
    pub title: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub flashcards: Vec<generation::FlashcardDto>,
    #[serde(default)]
    pub practice_questions: Vec<generation::PracticeQuestionDto>,
}

#[derive(Serialize, ToSchema)]
pub struct DocumentResponse {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub file_name: Option<String>,
    pub file_type: String,
    pub file_size: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl From<Document> for DocumentResponse {
    fn from(doc: Document) -> Self {
        Self {
            id: doc.id,
            title: doc.title,
            content: doc.content,
            file_name: doc.file_name,
            file_type: doc.file_type,
            file_size: doc.file_size,
            created_at: doc.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct DocumentDetailResponse {
    pub document: DocumentResponse,
    /// The newest summary, if materials have been generated.
    pub summary: Option<String>,
    pub flashcards: Vec<generation::FlashcardDto>,
    pub practice_questions: Vec<generation::PracticeQuestionDto>,
}

#[derive(Deserialize)]
pub struct DashboardQuery {
    pub tab: Option<String>,
    /// Comma-separated ids of the document cards to show expanded.
    pub expand: Option<String>,
}

//=========================================================================================
// Helpers
//=========================================================================================

/// Loads a document, reporting documents owned by someone else as missing.
pub async fn owned_document(
    state: &AppState,
    user_id: Uuid,
    document_id: Uuid,
) -> Result<Document, ApiError> {
    let document = state.db.get_document_by_id(document_id).await?;
    if document.user_id != user_id {
        return Err(PortError::NotFound(format!("Document {} not found", document_id)).into());
    }
    Ok(document)
}

fn parse_expanded(raw: Option<&str>) -> Result<HashSet<Uuid>, ApiError> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| {
            Uuid::parse_str(id)
                .map_err(|_| ApiError::BadRequest(format!("Invalid document id '{}' in expand", id)))
        })
        .collect()
}

fn validate_import(req: &ImportDocumentRequest) -> Result<StudyMaterials, ApiError> {
    let summary = req.summary.trim();
    if summary.is_empty() {
        return Err(ApiError::BadRequest("A summary is required".to_string()));
    }
    if req.flashcards.is_empty() || req.practice_questions.is_empty() {
        return Err(ApiError::BadRequest(
            "At least one flashcard and one practice question are required".to_string(),
        ));
    }
    let flashcards = req
        .flashcards
        .iter()
        .map(|card| {
            validate_flashcard(&card.question, &card.answer).ok_or_else(|| {
                ApiError::BadRequest("Every flashcard needs a question and an answer".to_string())
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    let practice_questions = req
        .practice_questions
        .iter()
        .map(|q| {
            validate_practice_question(&q.question, &q.options, &q.correct_answer, &q.explanation)
                .ok_or_else(|| {
                    ApiError::BadRequest(
                        "Every practice question needs four options and a correct answer among them"
                            .to_string(),
                    )
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(StudyMaterials {
        summary: summary.to_string(),
        flashcards,
        practice_questions,
        fallbacks: Vec::new(),
    })
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Store pasted text as a new document.
#[utoipa::path(
    post,
    path = "/documents",
    request_body = CreateDocumentRequest,
    responses(
        (status = 201, description = "Document created", body = DocumentResponse),
        (status = 400, description = "Content missing or too long", body = ErrorBody),
        (status = 401, description = "Not signed in", body = ErrorBody)
    )
)]
pub async fn create_document_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<CreateDocumentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let new_document =
        NewDocument::from_paste(req.title.as_deref(), &req.content).map_err(PortError::from)?;
    new_document
        .check_length(state.config.max_content_chars)
        .map_err(PortError::from)?;

    let document = state.db.create_document(user_id, &new_document).await?;
    info!(document_id = %document.id, "Document created from pasted text.");
    Ok((StatusCode::CREATED, Json(DocumentResponse::from(document))))
}

/// Upload a file as a new document.
///
/// Accepts a multipart/form-data request with a `file` part and an optional
/// `title` part.
#[utoipa::path(
    post,
    path = "/documents/upload",
    request_body(content_type = "multipart/form-data", description = "The document to upload."),
    responses(
        (status = 201, description = "Document created", body = DocumentResponse),
        (status = 400, description = "Missing file, unsupported type or unreadable text", body = ErrorBody),
        (status = 401, description = "Not signed in", body = ErrorBody)
    )
)]
pub async fn upload_document_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut title: Option<String> = None;
    let mut file: Option<(String, Option<String>, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read multipart data: {}", e)))?
    {
        match field.name() {
            Some("title") => {
                title = Some(field.text().await.map_err(|e| {
                    ApiError::BadRequest(format!("Failed to read title: {}", e))
                })?);
            }
            Some("file") => {
                let name = field.file_name().unwrap_or("untitled.txt").to_string();
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await.map_err(|e| {
                    ApiError::BadRequest(format!("Failed to read file bytes: {}", e))
                })?;
                file = Some((name, content_type, data.to_vec()));
            }
            _ => {}
        }
    }

    let (file_name, content_type, bytes) = file
        .ok_or_else(|| ApiError::BadRequest("Multipart form must include a file".to_string()))?;
    let new_document =
        NewDocument::from_upload(title.as_deref(), &file_name, content_type.as_deref(), &bytes)
            .map_err(PortError::from)?;
    new_document
        .check_length(state.config.max_content_chars)
        .map_err(PortError::from)?;

    let document = state.db.create_document(user_id, &new_document).await?;
    info!(document_id = %document.id, file_type = %document.file_type, "Document uploaded.");
    Ok((StatusCode::CREATED, Json(DocumentResponse::from(document))))
}

/// Save materials generated in guest mode, together with their source text.
#[utoipa::path(
    post,
    path = "/documents/import",
    request_body = ImportDocumentRequest,
    responses(
        (status = 201, description = "Document and materials saved", body = DocumentResponse),
        (status = 400, description = "Invalid document or materials", body = ErrorBody),
        (status = 401, description = "Not signed in", body = ErrorBody)
    )
)]
pub async fn import_document_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<ImportDocumentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let new_document =
        NewDocument::from_paste(req.title.as_deref(), &req.content).map_err(PortError::from)?;
    new_document
        .check_length(state.config.max_content_chars)
        .map_err(PortError::from)?;
    let materials = validate_import(&req)?;

    let document = state.db.create_document(user_id, &new_document).await?;
    if let Err(e) = state.db.replace_study_materials(document.id, &materials).await {
        // Don't leave a document behind without the materials it was imported with.
        if let Err(cleanup) = state.db.delete_document(document.id).await {
            error!(document_id = %document.id, "Failed to remove partially imported document: {}", cleanup);
        }
        return Err(e.into());
    }

    info!(document_id = %document.id, "Guest study materials imported.");
    Ok((StatusCode::CREATED, Json(DocumentResponse::from(document))))
}

/// List the caller's documents, newest first.
#[utoipa::path(
    get,
    path = "/documents",
    responses(
        (status = 200, description = "The caller's documents", body = [DocumentResponse]),
        (status = 401, description = "Not signed in", body = ErrorBody)
    )
)]
pub async fn list_documents_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let documents = state.db.list_documents(user_id).await?;
    Ok(Json(
        documents
            .into_iter()
            .map(DocumentResponse::from)
            .collect::<Vec<_>>(),
    ))
}

/// Fetch one document together with its generated materials.
#[utoipa::path(
    get,
    path = "/documents/{id}",
    params(("id" = Uuid, Path, description = "Document id")),
    responses(
        (status = 200, description = "The document and its materials", body = DocumentDetailResponse),
        (status = 404, description = "Document not found", body = ErrorBody)
    )
)]
pub async fn get_document_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(document_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let document = owned_document(&state, user_id, document_id).await?;
    let ids = [document.id];
    let summary = state
        .db
        .list_summaries(&ids)
        .await?
        .into_iter()
        .next()
        .map(|s| s.content);
    let flashcards = state.db.list_flashcards(&ids).await?;
    let questions = state.db.list_practice_questions(&ids).await?;

    Ok(Json(DocumentDetailResponse {
        document: document.into(),
        summary,
        flashcards: flashcards
            .into_iter()
            .map(|f| generation::FlashcardDto {
                question: f.question,
                answer: f.answer,
            })
            .collect(),
        practice_questions: questions
            .into_iter()
            .map(|q| generation::PracticeQuestionDto {
                question: q.question,
                options: q.options,
                correct_answer: q.correct_answer,
                explanation: q.explanation,
            })
            .collect(),
    }))
}

/// Delete a document and everything generated from it.
#[utoipa::path(
    delete,
    path = "/documents/{id}",
    params(("id" = Uuid, Path, description = "Document id")),
    responses(
        (status = 204, description = "Document deleted"),
        (status = 404, description = "Document not found", body = ErrorBody)
    )
)]
pub async fn delete_document_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(document_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    owned_document(&state, user_id, document_id).await?;
    state.db.delete_document(document_id).await?;
    state.study_sessions.remove_for_document(document_id).await;
    info!(%document_id, "Document deleted.");
    Ok(StatusCode::NO_CONTENT)
}

/// The dashboard: tab counts, document cards and material previews.
#[utoipa::path(
    get,
    path = "/dashboard",
    params(
        ("tab" = Option<String>, Query, description = "upload | documents | summaries | flashcards"),
        ("expand" = Option<String>, Query, description = "Comma-separated ids of expanded document cards")
    ),
    responses(
        (status = 200, description = "The dashboard view"),
        (status = 400, description = "Unknown tab or malformed id", body = ErrorBody),
        (status = 401, description = "Not signed in", body = ErrorBody)
    )
)]
pub async fn dashboard_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Query(query): Query<DashboardQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let tab = match query.tab.as_deref() {
        Some(raw) => raw.parse::<DashboardTab>().map_err(ApiError::BadRequest)?,
        None => DashboardTab::default(),
    };
    let expanded = parse_expanded(query.expand.as_deref())?;

    let documents = state.db.list_documents(user_id).await?;
    let ids: Vec<Uuid> = documents.iter().map(|d| d.id).collect();
    let summaries = state.db.list_summaries(&ids).await?;
    let flashcards = state.db.list_flashcards(&ids).await?;
    let questions = state.db.list_practice_questions(&ids).await?;

    Ok(Json(DashboardView::build(
        tab,
        documents,
        &summaries,
        &flashcards,
        &questions,
        &expanded,
    )))
}
