//! Browser login at the identity provider

use crate::headers::client_ip;
use crate::openapi::LOGIN_TAG;
use crate::session::LoginSession;
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Form, Router,
};
use http::{header, HeaderMap, StatusCode};
use log::{info, warn};
use serde::Deserialize;
use sso_core::cookies::{cookie_value, expired_cookie, session_cookie};

#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub next: Option<String>,
}

/// Only same-site absolute paths are followed after login
fn safe_next(next: Option<&str>) -> &str {
    match next.map(str::trim) {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => {
            path
        }
        _ => "/",
    }
}

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

fn login_page(next: &str, error: Option<&str>) -> Html<String> {
    let error = error
        .map(|e| format!("<p class=\"error\">{}</p>", escape_html(e)))
        .unwrap_or_default();
    Html(format!(
        "<!doctype html>
<html>
<head><meta charset=\"utf-8\"><title>Sign in</title></head>
<body>
<h1>Sign in</h1>
{error}
<form method=\"post\" action=\"/login\">
<input type=\"hidden\" name=\"next\" value=\"{next}\">
<label>Email <input type=\"email\" name=\"email\" required></label>
<label>Password <input type=\"password\" name=\"password\" required></label>
<button type=\"submit\">Sign in</button>
</form>
</body>
</html>",
        next = escape_html(next),
    ))
}

#[utoipa::path(
    get,
    path = "/login",
    tag = LOGIN_TAG,
    params(("next" = Option<String>, Query, description = "Local path to return to")),
    responses((status = 200, description = "Login form"))
)]
pub(crate) async fn login_form(Query(query): Query<LoginQuery>) -> Html<String> {
    login_page(safe_next(query.next.as_deref()), None)
}

#[utoipa::path(
    post,
    path = "/login",
    tag = LOGIN_TAG,
    responses(
        (status = 303, description = "Logged in, redirect to `next`"),
        (status = 401, description = "Invalid credentials")
    )
)]
pub(crate) async fn login_submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> Response {
    let next = safe_next(form.next.as_deref()).to_string();

    let user = match state
        .broker
        .authenticate_user(&form.email, &form.password)
        .await
    {
        Ok(Some(user)) => user,
        Ok(None) => {
            warn!("Failed login attempt from {:?}", client_ip(&headers));
            return (
                StatusCode::UNAUTHORIZED,
                login_page(&next, Some("Invalid email or password")),
            )
                .into_response();
        }
        Err(e) => {
            log::error!("Login failed: {e}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                login_page(&next, Some("Login is temporarily unavailable")),
            )
                .into_response();
        }
    };

    info!("User {} logged in", user.user_id);
    let session_config = &state.settings.session;
    let session_id = state.sessions.create(LoginSession::from(user)).await;
    let cookie = session_cookie(
        &session_config.cookie_name,
        &session_id,
        session_config.ttl_secs,
        session_config.secure_cookie,
    );

    (
        StatusCode::SEE_OTHER,
        [(header::SET_COOKIE, cookie), (header::LOCATION, next)],
    )
        .into_response()
}

#[utoipa::path(
    get,
    path = "/logout",
    tag = LOGIN_TAG,
    responses((status = 303, description = "Session dropped, redirect to the login page"))
)]
pub(crate) async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let session_config = &state.settings.session;
    if let Some(id) = cookie_value(&headers, &session_config.cookie_name) {
        state.sessions.remove(&id).await;
    }
    let cookie = expired_cookie(&session_config.cookie_name, session_config.secure_cookie);

    (
        StatusCode::SEE_OTHER,
        [
            (header::SET_COOKIE, cookie),
            (header::LOCATION, "/login".to_string()),
        ],
    )
        .into_response()
}

/// Landing page after a login without `next`
async fn home(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let session = match cookie_value(&headers, &state.settings.session.cookie_name) {
        Some(id) => state.sessions.get(&id).await,
        None => None,
    };
    match session {
        Some(session) => Html(format!(
            "<!doctype html><html><body><p>Signed in as {} ({})</p><a href=\"/logout\">Sign out</a></body></html>",
            escape_html(&session.name),
            escape_html(&session.email)
        ))
        .into_response(),
        None => Redirect::to("/login").into_response(),
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/login", get(login_form).post(login_submit))
        .route("/logout", get(logout))
}
