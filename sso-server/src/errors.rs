use axum::response::IntoResponse;
use axum::Json;
use http::StatusCode;
use serde_json::json;
use sso_core::BrokerError;

#[derive(Debug, Clone)]
pub struct ApiError {
    pub message: String,
    pub status_code: StatusCode,
}

impl ApiError {
    /// Create a new ApiError with a message and status code
    pub fn new<S: ToString>(message: S, status_code: StatusCode) -> Self {
        Self {
            message: message.to_string(),
            status_code,
        }
    }

    /// Create new Internal Server Error (500) with a message
    pub fn internal<S: ToString>(message: S) -> Self {
        Self::new(message, StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Create new Bad Request Error (400) with a message
    pub fn bad_request<S: ToString>(message: S) -> Self {
        Self::new(message, StatusCode::BAD_REQUEST)
    }

    /// Create new Unauthorized Error (401) with a message
    pub fn unauthorized<S: ToString>(message: S) -> Self {
        Self::new(message, StatusCode::UNAUTHORIZED)
    }
}

impl From<BrokerError> for ApiError {
    fn from(err: BrokerError) -> Self {
        match &err {
            BrokerError::ClientInvalid
            | BrokerError::ClientUnauthorized
            | BrokerError::TokenInvalid(_)
            | BrokerError::UserInactive => Self::unauthorized(err),
            BrokerError::CodeInvalid
            | BrokerError::CodeAlreadyUsed
            | BrokerError::CodeExpired
            | BrokerError::RedirectUnavailable
            | BrokerError::RedirectNotAllowed => Self::bad_request(err),
            _ => {
                log::error!("SSO request failed: {err}");
                Self::internal("Internal server error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status_code = self.status_code;
        let body = json!({
            "ok": false,
            "message": self.message,
        });
        (status_code, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sso_core::StoreError;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (BrokerError::ClientInvalid, StatusCode::UNAUTHORIZED),
            (BrokerError::ClientUnauthorized, StatusCode::UNAUTHORIZED),
            (BrokerError::CodeInvalid, StatusCode::BAD_REQUEST),
            (BrokerError::CodeAlreadyUsed, StatusCode::BAD_REQUEST),
            (BrokerError::CodeExpired, StatusCode::BAD_REQUEST),
            (BrokerError::TokenInvalid("x".into()), StatusCode::UNAUTHORIZED),
            (BrokerError::UserInactive, StatusCode::UNAUTHORIZED),
            (BrokerError::ConfigurationMissing, StatusCode::INTERNAL_SERVER_ERROR),
            (
                BrokerError::Storage(StoreError::DuplicateCode),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status_code, status);
        }
    }

    #[test]
    fn test_internal_errors_hide_details() {
        let err = ApiError::from(BrokerError::Signing("key material".into()));
        assert_eq!(err.message, "Internal server error");
    }
}
