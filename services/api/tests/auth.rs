//! Integration tests for password and email-code authentication.

mod common;

use axum::http::{header, StatusCode};
use chrono::{Duration, Utc};
use common::*;
use serde_json::json;
use study_assistant_core::domain::CodePurpose;
use study_assistant_core::ports::DatabaseService;
use study_assistant_core::verification::MAX_FAILED_ATTEMPTS;

async fn send_code(app: &TestApp, email: &str, purpose: &str) -> TestResponse {
    send(
        &app.router,
        json_request(
            "POST",
            "/auth/send-code",
            None,
            json!({"email": email, "type": purpose}),
        ),
    )
    .await
}

async fn verify_code(app: &TestApp, email: &str, code: &str, purpose: &str) -> TestResponse {
    send(
        &app.router,
        json_request(
            "POST",
            "/auth/verify-code",
            None,
            json!({"email": email, "code": code, "type": purpose}),
        ),
    )
    .await
}

//=========================================================================================
// Password Flow
//=========================================================================================

#[tokio::test]
async fn signup_login_and_logout() {
    let app = test_app();
    let cookie = sign_up(&app, "Ada@Example.com ").await;

    let login = send(
        &app.router,
        json_request(
            "POST",
            "/auth/login",
            None,
            json!({"email": "ada@example.com", "password": "correct horse"}),
        ),
    )
    .await;
    assert_eq!(login.status, StatusCode::OK);
    assert_eq!(login.body["email"], "ada@example.com");
    let set_cookie = login.headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("Max-Age=2592000"));

    let logout = send(
        &app.router,
        empty_request("POST", "/auth/logout", Some(&cookie)),
    )
    .await;
    assert_eq!(logout.status, StatusCode::OK);

    let after = send(&app.router, empty_request("GET", "/documents", Some(&cookie))).await;
    assert_eq!(after.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn duplicate_signup_conflicts() {
    let app = test_app();
    sign_up(&app, "ada@example.com").await;

    let again = send(
        &app.router,
        json_request(
            "POST",
            "/auth/signup",
            None,
            json!({"email": "ADA@example.com", "password": "another one"}),
        ),
    )
    .await;
    assert_eq!(again.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn short_password_is_rejected() {
    let app = test_app();
    let response = send(
        &app.router,
        json_request(
            "POST",
            "/auth/signup",
            None,
            json!({"email": "ada@example.com", "password": "12345"}),
        ),
    )
    .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn wrong_password_and_unknown_email_look_the_same() {
    let app = test_app();
    sign_up(&app, "ada@example.com").await;

    for (email, password) in [
        ("ada@example.com", "wrong password"),
        ("nobody@example.com", "correct horse"),
    ] {
        let response = send(
            &app.router,
            json_request(
                "POST",
                "/auth/login",
                None,
                json!({"email": email, "password": password}),
            ),
        )
        .await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert!(response.session_cookie().is_none());
    }
}

//=========================================================================================
// Email Code Flow
//=========================================================================================

#[tokio::test]
async fn signup_with_a_code_creates_the_account_and_a_session() {
    let app = test_app();

    let sent = send_code(&app, "grace@example.com", "signup").await;
    assert_eq!(sent.status, StatusCode::OK);
    assert_eq!(sent.body["success"], true);
    assert_eq!(sent.body["message"], "Verification code sent successfully");

    let code = app.mailer.last_code("grace@example.com").unwrap();
    assert_eq!(code.len(), 6);
    assert!(code.chars().all(|c| c.is_ascii_digit()));

    let verified = verify_code(&app, "grace@example.com", &code, "signup").await;
    assert_eq!(verified.status, StatusCode::OK, "{:?}", verified.body);
    assert_eq!(verified.body["success"], true);
    assert_eq!(verified.body["message"], "Account created successfully");
    assert!(verified.body["userId"].is_string());

    let cookie = verified.session_cookie().unwrap();
    let documents = send(&app.router, empty_request("GET", "/documents", Some(&cookie))).await;
    assert_eq!(documents.status, StatusCode::OK);
}

#[tokio::test]
async fn login_with_a_code_for_an_existing_account() {
    let app = test_app();
    sign_up(&app, "ada@example.com").await;

    send_code(&app, "ada@example.com", "login").await;
    let code = app.mailer.last_code("ada@example.com").unwrap();

    let verified = verify_code(&app, "ada@example.com", &code, "login").await;
    assert_eq!(verified.status, StatusCode::OK);
    assert_eq!(verified.body["message"], "Login successful");
    assert!(verified.session_cookie().is_some());
}

#[tokio::test]
async fn a_code_works_only_once() {
    let app = test_app();
    send_code(&app, "grace@example.com", "signup").await;
    let code = app.mailer.last_code("grace@example.com").unwrap();

    let first = verify_code(&app, "grace@example.com", &code, "signup").await;
    assert_eq!(first.status, StatusCode::OK);

    let second = verify_code(&app, "grace@example.com", &code, "signup").await;
    assert_eq!(second.status, StatusCode::BAD_REQUEST);
    assert_eq!(second.body["error"], "Invalid or expired verification code");
}

#[tokio::test]
async fn an_expired_code_is_rejected() {
    let app = test_app();
    app.db
        .insert_verification_code(
            "grace@example.com",
            "424242",
            CodePurpose::Signup,
            Utc::now() - Duration::seconds(1),
        )
        .await
        .unwrap();

    let response = verify_code(&app, "grace@example.com", "424242", "signup").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.session_cookie().is_none());
}

#[tokio::test]
async fn repeated_wrong_guesses_invalidate_the_real_code() {
    let app = test_app();
    sign_up(&app, "ada@example.com").await;
    send_code(&app, "ada@example.com", "login").await;
    let code = app.mailer.last_code("ada@example.com").unwrap();
    let wrong = if code == "100000" { "100001" } else { "100000" };

    for _ in 0..MAX_FAILED_ATTEMPTS {
        let guess = verify_code(&app, "ada@example.com", wrong, "login").await;
        assert_eq!(guess.status, StatusCode::BAD_REQUEST);
    }

    let response = verify_code(&app, "ada@example.com", &code, "login").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.session_cookie().is_none());

    // A freshly requested code works again.
    send_code(&app, "ada@example.com", "login").await;
    let fresh = app.mailer.last_code("ada@example.com").unwrap();
    let retry = verify_code(&app, "ada@example.com", &fresh, "login").await;
    assert_eq!(retry.status, StatusCode::OK);
}

#[tokio::test]
async fn a_code_is_bound_to_its_purpose() {
    let app = test_app();
    sign_up(&app, "ada@example.com").await;
    send_code(&app, "ada@example.com", "signup").await;
    let code = app.mailer.last_code("ada@example.com").unwrap();

    let response = verify_code(&app, "ada@example.com", &code, "login").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn signup_code_for_an_existing_account_conflicts() {
    let app = test_app();
    sign_up(&app, "ada@example.com").await;
    send_code(&app, "ada@example.com", "signup").await;
    let code = app.mailer.last_code("ada@example.com").unwrap();

    let response = verify_code(&app, "ada@example.com", &code, "signup").await;
    assert_eq!(response.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn login_code_without_an_account_is_unauthorized() {
    let app = test_app();
    send_code(&app, "nobody@example.com", "login").await;
    let code = app.mailer.last_code("nobody@example.com").unwrap();

    let response = verify_code(&app, "nobody@example.com", &code, "login").await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn missing_email_or_code_is_a_bad_request() {
    let app = test_app();

    let no_email = send_code(&app, "", "signup").await;
    assert_eq!(no_email.status, StatusCode::BAD_REQUEST);
    assert_eq!(app.mailer.sent_count(), 0);

    let no_code = verify_code(&app, "grace@example.com", "", "signup").await;
    assert_eq!(no_code.status, StatusCode::BAD_REQUEST);

    let bad_type = send_code(&app, "grace@example.com", "magic").await;
    assert_eq!(bad_type.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn code_accounts_cannot_log_in_with_a_password() {
    let app = test_app();
    send_code(&app, "grace@example.com", "signup").await;
    let code = app.mailer.last_code("grace@example.com").unwrap();
    verify_code(&app, "grace@example.com", &code, "signup").await;

    let response = send(
        &app.router,
        json_request(
            "POST",
            "/auth/login",
            None,
            json!({"email": "grace@example.com", "password": "anything at all"}),
        ),
    )
    .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}
