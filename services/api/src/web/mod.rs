pub mod auth;
pub mod generation;
pub mod middleware;
pub mod protocol;
pub mod rest;
pub mod router;
pub mod state;
pub mod study;

// Re-export what the binaries and integration tests need to assemble the server.
pub use middleware::require_auth;
pub use rest::ApiDoc;
pub use router::build_router;
pub use state::AppState;
