use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use warden::{Error as WardenError, LoginDecision};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("{message}")]
    AccountLocked {
        message: String,
        retry_after: Option<u64>,
    },

    #[error("{message}")]
    AddressBlocked {
        message: String,
        retry_after: Option<u64>,
    },

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl ApiError {
    /// Error response for a login decision that refused the attempt.
    pub fn from_denied(decision: &LoginDecision) -> Self {
        if decision.is_blocked {
            ApiError::AddressBlocked {
                message: decision.message.clone(),
                retry_after: decision.retry_after_seconds(),
            }
        } else if decision.lockout_until.is_some() {
            ApiError::AccountLocked {
                message: decision.message.clone(),
                retry_after: decision.retry_after_seconds(),
            }
        } else {
            ApiError::ServiceUnavailable(decision.message.clone())
        }
    }
}

impl From<WardenError> for ApiError {
    fn from(err: WardenError) -> Self {
        if err.is_validation_error() {
            ApiError::BadRequest(err.to_string())
        } else if err.is_store_unavailable() {
            ApiError::ServiceUnavailable(err.to_string())
        } else {
            ApiError::InternalError(err.to_string())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message, retry_after) = match self {
            ApiError::BadRequest(ref msg) => (StatusCode::BAD_REQUEST, msg.as_str(), None),
            ApiError::AccountLocked {
                ref message,
                retry_after,
            } => (StatusCode::LOCKED, message.as_str(), retry_after),
            ApiError::AddressBlocked {
                ref message,
                retry_after,
            } => (StatusCode::TOO_MANY_REQUESTS, message.as_str(), retry_after),
            ApiError::ServiceUnavailable(ref msg) => {
                tracing::error!(error = %msg, "Login protection unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Login protection is temporarily unavailable",
                    None,
                )
            }
            ApiError::InternalError(ref msg) => {
                tracing::error!(error = %msg, "Login protection error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error",
                    None,
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
            "code": status.as_u16()
        }));

        let mut response = (status, body).into_response();
        if let Some(value) = retry_after.and_then(|s| HeaderValue::from_str(&s.to_string()).ok()) {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
        response
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use warden::StorageError;

    #[test]
    fn test_store_errors_map_to_status_codes() {
        let err: ApiError = WardenError::from(StorageError::Connection("refused".into())).into();
        assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);

        let err: ApiError = WardenError::from(StorageError::Command("WRONGTYPE".into())).into();
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_locked_response_has_retry_after() {
        let response = ApiError::AccountLocked {
            message: "locked".into(),
            retry_after: Some(120),
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::LOCKED);
        assert_eq!(response.headers()[header::RETRY_AFTER], "120");
    }
}
