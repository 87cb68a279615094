//! Relying-party side of the SSO handshake.
//!
//! The relay receives the browser on `/sso/callback`, exchanges the code with
//! the identity provider server-to-server, loads the user's roles and module
//! permissions from userinfo and keeps them in a local cookie session.

pub mod client;
pub mod config;
pub mod error;
pub mod routes;
pub mod session;
pub mod state;

pub use client::IdpClient;
pub use config::{LocalValidationConfig, RelaySettings, SessionConfig};
pub use error::{RelayError, SessionError};
pub use session::{RelaySession, SessionStore};
pub use state::RelayState;

use axum::Router;

/// Create a new relay application with a given state
pub fn create_app(state: RelayState) -> Router {
    routes::router().with_state(state)
}
