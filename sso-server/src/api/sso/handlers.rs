use crate::api::sso::models::{
    ErrorResponse, ExchangeRequest, ExchangeResponse, StartQuery, UserInfoResponse,
};
use crate::errors::ApiError;
use crate::headers::{apply_no_store, bearer_token, request_context};
use crate::openapi::{LOGIN_TAG, SSO_TAG};
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, OriginalUri, Path, Query, State},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use http::{HeaderMap, StatusCode};
use log::{info, warn};
use sso_core::cookies::cookie_value;
use sso_core::BrokerError;
use url::form_urlencoded;

/// Exchanges a one-time authorization code for an audience-bound token
#[utoipa::path(
    post,
    path = "/api/sso/exchange",
    tag = SSO_TAG,
    request_body = ExchangeRequest,
    responses(
        (status = 200, description = "Code exchanged", body = ExchangeResponse),
        (status = 400, description = "Missing parameters or invalid, used or expired code", body = ErrorResponse),
        (status = 401, description = "Unknown, disabled or unauthenticated client", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub(crate) async fn exchange_handler(
    State(state): State<AppState>,
    payload: Result<Json<ExchangeRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!("Unreadable exchange request: {rejection}");
            ExchangeRequest::default()
        }
    };
    let Some(params) = request.into_params() else {
        return ApiError::bad_request("Missing parameters").into_response();
    };

    match state
        .broker
        .exchange(&params.code, &params.client_id, &params.client_secret)
        .await
    {
        Ok(token) => {
            let mut response =
                (StatusCode::OK, Json(ExchangeResponse::from(token))).into_response();
            apply_no_store(&mut response);
            response
        }
        Err(err) => {
            warn!(
                "Code exchange failed for client {}: {}",
                params.client_id, err
            );
            ApiError::from(err).into_response()
        }
    }
}

/// Returns identity, roles, modules and permissions for a bearer token
#[utoipa::path(
    get,
    path = "/api/sso/userinfo",
    tag = SSO_TAG,
    params(
        ("Authorization" = String, Header, description = "Bearer access token"),
    ),
    responses(
        (status = 200, description = "Token is valid", body = UserInfoResponse),
        (status = 401, description = "Missing, invalid or expired token, or inactive user", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub(crate) async fn userinfo_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(token) = bearer_token(&headers) else {
        return ApiError::unauthorized("Missing bearer token").into_response();
    };

    match state.broker.userinfo(&token).await {
        Ok(grant) => {
            let mut response =
                (StatusCode::OK, Json(UserInfoResponse::from(grant))).into_response();
            apply_no_store(&mut response);
            response
        }
        Err(err) => {
            warn!("Userinfo rejected: {err}");
            ApiError::from(err).into_response()
        }
    }
}

/// Issues a code for the logged-in user and redirects the browser to the client
#[utoipa::path(
    get,
    path = "/sso/start/{client_id}",
    tag = LOGIN_TAG,
    params(
        ("client_id" = String, Path, description = "Registered client identifier"),
        ("redirect" = Option<String>, Query, description = "Preferred registered redirect URL"),
    ),
    responses(
        (status = 303, description = "Redirect to the client callback, or to the login page"),
        (status = 400, description = "Invalid client or redirect"),
        (status = 500, description = "Internal server error")
    )
)]
pub(crate) async fn start_handler(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
    Query(query): Query<StartQuery>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> Response {
    let session = match cookie_value(&headers, &state.settings.session.cookie_name) {
        Some(id) => state.sessions.get(&id).await,
        None => None,
    };
    let Some(session) = session else {
        let next = uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| uri.path().to_string());
        let encoded: String = form_urlencoded::byte_serialize(next.as_bytes()).collect();
        return Redirect::to(&format!("/login?next={encoded}")).into_response();
    };

    let ctx = request_context(&headers);
    match state
        .broker
        .start_redirect(&client_id, &session.user_id, query.redirect.as_deref(), &ctx)
        .await
    {
        Ok(start) => {
            info!(
                "SSO start for client={} user={}",
                client_id, session.user_id
            );
            Redirect::to(&start.location).into_response()
        }
        Err(
            err @ (BrokerError::ClientInvalid
            | BrokerError::RedirectUnavailable
            | BrokerError::RedirectNotAllowed),
        ) => {
            warn!("SSO start rejected for client {client_id}: {err}");
            (StatusCode::BAD_REQUEST, err.to_string()).into_response()
        }
        Err(err) => {
            log::error!("SSO start failed for client {client_id}: {err}");
            (StatusCode::INTERNAL_SERVER_ERROR, "SSO is temporarily unavailable").into_response()
        }
    }
}
