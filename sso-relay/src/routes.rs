//! Relying-party routes
//!
//! - `GET /sso/callback`: exchanges the code, loads userinfo and opens a local session
//! - `GET /login`: sends the browser to the identity provider
//! - `GET /logout`: drops the local session
//! - `GET /api/session`: current session or 401
//! - `GET /api/modules/{module_key}`: module guard, 403 unless allowed

use crate::error::{RelayError, SessionError};
use crate::session::RelaySession;
use crate::state::RelayState;
use axum::{
    extract::{FromRequestParts, Path, Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Json, Router,
};
use http::request::Parts;
use http::{header, HeaderMap, StatusCode};
use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::json;
use sso_core::cookies::{cookie_value, expired_cookie, session_cookie};

#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

impl FromRequestParts<RelayState> for RelaySession {
    type Rejection = SessionError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &RelayState,
    ) -> Result<Self, Self::Rejection> {
        let id = cookie_value(&parts.headers, &state.settings.session.cookie_name)
            .ok_or(SessionError::Missing)?;
        state.sessions.get(&id).await.ok_or(SessionError::Missing)
    }
}

async fn callback(
    State(state): State<RelayState>,
    Query(query): Query<CallbackQuery>,
) -> Result<Response, RelayError> {
    let code = query
        .code
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or(RelayError::MissingCode)?;
    // The state round-trips from the identity provider but is not bound to this browser
    debug!("SSO callback with state {:?}", query.state);

    let grant = state.idp.exchange(code).await?;
    let session = match state.idp.userinfo(&grant.access_token).await {
        Ok(answer) if answer.client_id == state.idp.client_id() => RelaySession::from(answer.user),
        Ok(answer) => {
            return Err(RelayError::InvalidResponse(format!(
                "userinfo answered for client {}",
                answer.client_id
            )))
        }
        Err(err) => state.local_session(&grant.access_token, err)?,
    };

    info!(
        "Local session opened for user {} (degraded: {})",
        session.user_id, session.degraded
    );
    let session_config = &state.settings.session;
    let id = state.sessions.create(session).await;
    let cookie = session_cookie(
        &session_config.cookie_name,
        &id,
        session_config.ttl_secs,
        session_config.secure_cookie,
    );

    Ok((
        StatusCode::SEE_OTHER,
        [
            (header::SET_COOKIE, cookie),
            (header::LOCATION, state.settings.home_path.clone()),
        ],
    )
        .into_response())
}

async fn login(State(state): State<RelayState>) -> Result<Redirect, RelayError> {
    let url = state.idp.start_url()?;
    Ok(Redirect::to(url.as_str()))
}

async fn logout(State(state): State<RelayState>, headers: HeaderMap) -> Response {
    let session_config = &state.settings.session;
    if let Some(id) = cookie_value(&headers, &session_config.cookie_name) {
        state.sessions.remove(&id).await;
    }
    let cookie = expired_cookie(&session_config.cookie_name, session_config.secure_cookie);

    (
        StatusCode::SEE_OTHER,
        [
            (header::SET_COOKIE, cookie),
            (header::LOCATION, state.settings.home_path.clone()),
        ],
    )
        .into_response()
}

async fn current_session(session: RelaySession) -> Json<serde_json::Value> {
    Json(json!({ "ok": true, "session": session }))
}

async fn module_access(
    session: RelaySession,
    Path(module_key): Path<String>,
) -> Result<Json<serde_json::Value>, SessionError> {
    if let Err(err) = session.require_module(&module_key) {
        warn!("User {} denied module {}", session.user_id, module_key);
        return Err(err);
    }
    Ok(Json(json!({ "ok": true, "module_key": module_key })))
}

pub fn router() -> Router<RelayState> {
    Router::new()
        .route("/sso/callback", get(callback))
        .route("/login", get(login))
        .route("/logout", get(logout))
        .route("/api/session", get(current_session))
        .route("/api/modules/{module_key}", get(module_access))
}
