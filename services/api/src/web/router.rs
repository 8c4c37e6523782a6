//! services/api/src/web/router.rs
//!
//! Assembles the HTTP router: public routes, session-protected routes, and the
//! layers shared by both.

use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        Method,
    },
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::web::{
    auth::{login_handler, logout_handler, send_code_handler, signup_handler, verify_code_handler},
    generation::{generate_study_materials_handler, process_document_handler},
    middleware::require_auth,
    rest::{
        create_document_handler, dashboard_handler, delete_document_handler,
        get_document_handler, health_handler, import_document_handler, list_documents_handler,
        upload_document_handler,
    },
    state::AppState,
    study::{start_study_handler, study_command_handler},
};

const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Builds the API router. Swagger UI is merged on top by the `api` binary.
pub fn build_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(app_state.config.cors_origin.clone())
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health_handler))
        .route("/auth/signup", post(signup_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/logout", post(logout_handler))
        .route("/auth/send-code", post(send_code_handler))
        .route("/auth/verify-code", post(verify_code_handler))
        .route(
            "/functions/generate-study-materials",
            post(generate_study_materials_handler),
        );

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/functions/process-document", post(process_document_handler))
        .route(
            "/documents",
            get(list_documents_handler).post(create_document_handler),
        )
        .route("/documents/upload", post(upload_document_handler))
        .route("/documents/import", post(import_document_handler))
        .route(
            "/documents/{id}",
            get(get_document_handler).delete(delete_document_handler),
        )
        .route("/documents/{id}/study", post(start_study_handler))
        .route("/study/{session_id}/commands", post(study_command_handler))
        .route("/dashboard", get(dashboard_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
