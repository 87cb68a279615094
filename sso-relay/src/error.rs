use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;
use serde_json::json;
use thiserror::Error;

/// Failures of the callback flow against the identity provider
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Identity provider unreachable: {0}")]
    Transport(String),

    #[error("Identity provider timed out")]
    Timeout,

    /// The identity provider answered with a non-success status
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },

    #[error("Unexpected identity provider response: {0}")]
    InvalidResponse(String),

    #[error("Missing code")]
    MissingCode,

    #[error("Not logged in")]
    NoSession,
}

impl From<reqwest::Error> for RelayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RelayError::Timeout
        } else if err.is_decode() {
            RelayError::InvalidResponse(err.to_string())
        } else {
            RelayError::Transport(err.to_string())
        }
    }
}

impl RelayError {
    /// The identity provider could not answer. A 4xx answer is a verdict, not an outage.
    pub fn is_idp_unavailable(&self) -> bool {
        match self {
            RelayError::Transport(_) | RelayError::Timeout | RelayError::InvalidResponse(_) => true,
            RelayError::Rejected { status, .. } => status.is_server_error(),
            RelayError::MissingCode | RelayError::NoSession => false,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::Transport(_) | RelayError::InvalidResponse(_) => StatusCode::BAD_GATEWAY,
            RelayError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            RelayError::Rejected { status, .. } if status.is_server_error() => {
                StatusCode::BAD_GATEWAY
            }
            RelayError::Rejected { .. } | RelayError::NoSession => StatusCode::UNAUTHORIZED,
            RelayError::MissingCode => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();
        if status_code.is_server_error() {
            log::error!("SSO callback failed: {self}");
        }
        let body = json!({
            "ok": false,
            "message": self.to_string(),
        });
        (status_code, Json(body)).into_response()
    }
}

/// Access check failures on an established session
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Not logged in")]
    Missing,

    #[error("Access to module '{0}' denied")]
    Forbidden(String),
}

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        let status_code = match self {
            SessionError::Missing => StatusCode::UNAUTHORIZED,
            SessionError::Forbidden(_) => StatusCode::FORBIDDEN,
        };
        let body = json!({
            "ok": false,
            "message": self.to_string(),
        });
        (status_code, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (RelayError::Transport("refused".into()), StatusCode::BAD_GATEWAY),
            (RelayError::Timeout, StatusCode::GATEWAY_TIMEOUT),
            (
                RelayError::Rejected {
                    status: StatusCode::BAD_REQUEST,
                    message: "Code already used".into(),
                },
                StatusCode::UNAUTHORIZED,
            ),
            (
                RelayError::Rejected {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: "Internal server error".into(),
                },
                StatusCode::BAD_GATEWAY,
            ),
            (RelayError::InvalidResponse("eof".into()), StatusCode::BAD_GATEWAY),
            (RelayError::MissingCode, StatusCode::BAD_REQUEST),
            (RelayError::NoSession, StatusCode::UNAUTHORIZED),
        ];
        for (err, expected) in cases {
            assert_eq!(err.status_code(), expected, "{err}");
        }
    }

    #[test]
    fn test_only_outages_count_as_unavailable() {
        assert!(RelayError::Timeout.is_idp_unavailable());
        assert!(RelayError::Transport("refused".into()).is_idp_unavailable());
        assert!(RelayError::InvalidResponse("eof".into()).is_idp_unavailable());
        assert!(RelayError::Rejected {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: "Service Unavailable".into(),
        }
        .is_idp_unavailable());
        assert!(!RelayError::Rejected {
            status: StatusCode::UNAUTHORIZED,
            message: "Invalid or inactive user".into(),
        }
        .is_idp_unavailable());
    }

    #[test]
    fn test_rejection_keeps_idp_message() {
        let err = RelayError::Rejected {
            status: StatusCode::UNAUTHORIZED,
            message: "Invalid client_secret".into(),
        };
        assert_eq!(err.to_string(), "Invalid client_secret");
    }

    #[test]
    fn test_session_error_status() {
        let resp = SessionError::Forbidden("industrial".into()).into_response();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let resp = SessionError::Missing.into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
