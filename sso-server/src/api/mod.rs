pub(crate) mod health;
pub(crate) mod login;
pub(crate) mod sso;

use crate::state::AppState;
use axum::Router;

/// Combines all API routes into a single router
pub(super) fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(login::router())
        .merge(sso::router())
}
