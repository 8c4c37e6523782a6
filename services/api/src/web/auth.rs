//! services/api/src/web/auth.rs
//!
//! Authentication endpoints. Accounts are reached either with a password
//! (signup, login, logout) or with a six-digit code sent by email
//! (send-code, verify-code). Both paths end in the same session cookie.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use study_assistant_core::domain::{CodePurpose, User};
use study_assistant_core::ports::PortError;
use study_assistant_core::verification::{
    expiry_from, generate_code, is_well_formed, normalize_email,
};
use tracing::{error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{ApiError, ErrorBody};
use crate::web::middleware::session_cookie;
use crate::web::state::AppState;

const SESSION_DAYS: i64 = 30;
const MIN_PASSWORD_CHARS: usize = 6;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub user_id: Uuid,
    pub email: String,
}

#[derive(Deserialize, ToSchema)]
pub struct SendCodeRequest {
    #[serde(default)]
    pub email: String,
    /// `signup` or `login`.
    #[serde(rename = "type", default)]
    pub purpose: String,
}

#[derive(Deserialize, ToSchema)]
pub struct VerifyCodeRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub code: String,
    /// `signup` or `login`.
    #[serde(rename = "type", default)]
    pub purpose: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CodeResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
}

//=========================================================================================
// Helpers
//=========================================================================================

fn require_email(raw: &str) -> Result<String, ApiError> {
    if raw.trim().is_empty() {
        return Err(ApiError::BadRequest("Email is required".to_string()));
    }
    normalize_email(raw).ok_or_else(|| ApiError::BadRequest("Invalid email address".to_string()))
}

fn parse_purpose(raw: &str) -> Result<CodePurpose, ApiError> {
    raw.parse::<CodePurpose>().map_err(ApiError::BadRequest)
}

fn invalid_credentials() -> ApiError {
    ApiError::Port(PortError::Unauthorized)
}

/// Creates an auth session for `user_id` and returns the `Set-Cookie` value.
pub async fn start_session(state: &AppState, user_id: Uuid) -> Result<String, ApiError> {
    let auth_session_id = Uuid::new_v4().to_string();
    let expires_at = Utc::now() + Duration::days(SESSION_DAYS);
    state
        .db
        .create_auth_session(&auth_session_id, user_id, expires_at)
        .await?;

    Ok(format!(
        "session={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        auth_session_id,
        Duration::days(SESSION_DAYS).num_seconds()
    ))
}

fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            ApiError::Internal("Failed to hash password".to_string())
        })
}

//=========================================================================================
// Password Handlers
//=========================================================================================

/// POST /auth/signup - Create a new user account
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "User created successfully", body = AuthResponse),
        (status = 400, description = "Invalid request", body = ErrorBody),
        (status = 409, description = "Email already registered", body = ErrorBody)
    )
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = require_email(&req.email)?;
    if req.password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(ApiError::BadRequest(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_CHARS
        )));
    }

    let password_hash = hash_password(&req.password)?;
    let user = state.db.create_user(&email, Some(&password_hash)).await?;
    let cookie = start_session(&state, user.user_id).await?;
    info!(user_id = %user.user_id, "User signed up with password.");

    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, cookie)],
        Json(AuthResponse {
            user_id: user.user_id,
            email: user.email,
        }),
    ))
}

/// POST /auth/login - Login with existing account
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials", body = ErrorBody)
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = require_email(&req.email)?;
    let user_creds = state
        .db
        .get_credentials_by_email(&email)
        .await
        .map_err(|e| match e {
            PortError::NotFound(_) => invalid_credentials(),
            other => other.into(),
        })?;

    // Accounts created with an email code have no password to check against.
    let stored_hash = user_creds.hashed_password.ok_or_else(invalid_credentials)?;
    let parsed_hash = PasswordHash::new(&stored_hash).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        ApiError::Internal("Authentication error".to_string())
    })?;
    if Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .is_err()
    {
        return Err(invalid_credentials());
    }

    let cookie = start_session(&state, user_creds.user_id).await?;
    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(AuthResponse {
            user_id: user_creds.user_id,
            email: user_creds.email,
        }),
    ))
}

/// POST /auth/logout - Logout and invalidate session
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "No active session", body = ErrorBody)
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let auth_session_id = session_cookie(&headers).ok_or(PortError::Unauthorized)?;
    if let Ok(user_id) = state.db.validate_auth_session(auth_session_id).await {
        state.study_sessions.remove_for_user(user_id).await;
    }
    state.db.delete_auth_session(auth_session_id).await?;

    let cookie = "session=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0";
    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie.to_string())]))
}

//=========================================================================================
// Email Code Handlers
//=========================================================================================

/// POST /auth/send-code - Email a six-digit verification code
#[utoipa::path(
    post,
    path = "/auth/send-code",
    request_body = SendCodeRequest,
    responses(
        (status = 200, description = "Code sent", body = CodeResponse),
        (status = 400, description = "Missing or invalid email", body = ErrorBody),
        (status = 502, description = "Mail delivery failed", body = ErrorBody)
    )
)]
pub async fn send_code_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SendCodeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = require_email(&req.email)?;
    let purpose = parse_purpose(&req.purpose)?;

    let code = generate_code(&mut rand::thread_rng());
    let expires_at = expiry_from(Utc::now(), state.config.verification_code_ttl);
    state
        .db
        .insert_verification_code(&email, &code, purpose, expires_at)
        .await?;
    state
        .mailer
        .send_verification_code(&email, &code, purpose)
        .await?;
    info!(purpose = purpose.as_str(), "Verification code issued.");

    Ok(Json(CodeResponse {
        success: true,
        message: "Verification code sent successfully".to_string(),
        user_id: None,
    }))
}

/// POST /auth/verify-code - Redeem a code and sign in
///
/// A `signup` code creates the account; a `login` code requires one to exist.
#[utoipa::path(
    post,
    path = "/auth/verify-code",
    request_body = VerifyCodeRequest,
    responses(
        (status = 200, description = "Code accepted, session started", body = CodeResponse),
        (status = 400, description = "Missing email or code, or the code is invalid or expired", body = ErrorBody),
        (status = 401, description = "Login code for an email with no account", body = ErrorBody),
        (status = 409, description = "Account already exists", body = ErrorBody)
    )
)]
pub async fn verify_code_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VerifyCodeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = require_email(&req.email)?;
    let code = req.code.trim();
    if code.is_empty() {
        return Err(ApiError::BadRequest("Email and code are required".to_string()));
    }
    let purpose = parse_purpose(&req.purpose)?;

    let rejected = || {
        ApiError::Port(PortError::InvalidInput(
            "Invalid or expired verification code".to_string(),
        ))
    };
    if !is_well_formed(code) {
        return Err(rejected());
    }
    state
        .db
        .redeem_verification_code(&email, code, purpose, Utc::now())
        .await
        .map_err(|e| match e {
            PortError::NotFound(_) => {
                warn!(purpose = purpose.as_str(), "Verification code rejected.");
                rejected()
            }
            other => other.into(),
        })?;

    let (user, message): (User, &str) = match purpose {
        CodePurpose::Signup => (
            state.db.create_user(&email, None).await?,
            "Account created successfully",
        ),
        CodePurpose::Login => (
            state
                .db
                .get_user_by_email(&email)
                .await
                .map_err(|e| match e {
                    PortError::NotFound(_) => invalid_credentials(),
                    other => other.into(),
                })?,
            "Login successful",
        ),
    };

    let cookie = start_session(&state, user.user_id).await?;
    info!(user_id = %user.user_id, purpose = purpose.as_str(), "Signed in with verification code.");

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(CodeResponse {
            success: true,
            message: message.to_string(),
            user_id: Some(user.user_id),
        }),
    ))
}
