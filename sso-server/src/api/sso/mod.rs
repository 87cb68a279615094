//! SSO endpoints of the identity provider
//!
//! - `GET /sso/start/{client_id}`: browser entry point, issues a code for the
//!   logged-in user and redirects to the client's registered callback
//! - `POST /api/sso/exchange`: server-to-server code exchange
//! - `GET /api/sso/userinfo`: identity and permissions behind a token

pub mod handlers;
pub mod models;
#[cfg(test)]
mod tests;

use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

/// Creates the SSO routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sso/start/{client_id}", get(handlers::start_handler))
        .route("/api/sso/exchange", post(handlers::exchange_handler))
        .route("/api/sso/userinfo", get(handlers::userinfo_handler))
}
