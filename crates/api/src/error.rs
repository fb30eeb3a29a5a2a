//! API error type
//!
//! Every domain failure maps to a specific status code and a JSON body
//! carrying the message, so the UI can surface the exact condition
//! ("a request is already pending") instead of a generic failure.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use talentry_subscriptions::SubscriptionError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("Insufficient permissions")]
    Forbidden,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unprocessable(String),

    #[error("{0}")]
    Validation(String),

    #[error("Service temporarily unavailable")]
    Unavailable(String),

    #[error("Internal server error")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Internal detail stays in the logs, not in the response body.
        let message = match &self {
            ApiError::Unavailable(detail) | ApiError::Internal(detail) => {
                tracing::error!(status = %status, detail = %detail, "Request failed");
                self.to_string()
            }
            other => other.to_string(),
        };

        let body = Json(serde_json::json!({ "error": message }));
        (status, body).into_response()
    }
}

impl From<SubscriptionError> for ApiError {
    fn from(e: SubscriptionError) -> Self {
        match e {
            SubscriptionError::RequestNotFound(_) | SubscriptionError::PlanNotFound(_) => {
                ApiError::NotFound(e.to_string())
            }
            SubscriptionError::AlreadyPending(_) => ApiError::Conflict(e.to_string()),
            SubscriptionError::InvalidTransition => ApiError::Conflict(e.to_string()),
            SubscriptionError::Conflict(msg) => ApiError::Conflict(msg),
            SubscriptionError::NoOpChange | SubscriptionError::NoSubscription(_) => {
                ApiError::Unprocessable(e.to_string())
            }
            SubscriptionError::Unauthorized => ApiError::Forbidden,
            SubscriptionError::Validation(msg) => ApiError::Validation(msg),
            SubscriptionError::Transient(detail) => ApiError::Unavailable(detail),
            SubscriptionError::Database(detail) => ApiError::Internal(detail),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn domain_errors_map_to_expected_statuses() {
        let cases = [
            (
                ApiError::from(SubscriptionError::PlanNotFound(Uuid::new_v4())),
                StatusCode::NOT_FOUND,
            ),
            (
                ApiError::from(SubscriptionError::AlreadyPending(Uuid::new_v4())),
                StatusCode::CONFLICT,
            ),
            (
                ApiError::from(SubscriptionError::InvalidTransition),
                StatusCode::CONFLICT,
            ),
            (
                ApiError::from(SubscriptionError::NoOpChange),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                ApiError::from(SubscriptionError::Unauthorized),
                StatusCode::FORBIDDEN,
            ),
            (
                ApiError::from(SubscriptionError::Transient("pool".into())),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];
        for (error, expected) in cases {
            assert_eq!(error.status(), expected);
        }
    }
}
