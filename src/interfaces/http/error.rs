use crate::error::PaymentError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

/// Transport wrapper so handlers can `?` any [`PaymentError`].
#[derive(Debug)]
pub struct ApiError(pub PaymentError);

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        Self(err)
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

pub fn status_for(err: &PaymentError) -> StatusCode {
    match err {
        PaymentError::Validation { .. } => StatusCode::BAD_REQUEST,
        PaymentError::NotFound { .. } => StatusCode::NOT_FOUND,
        PaymentError::InsufficientFunds { .. } | PaymentError::LimitExceeded { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        PaymentError::Conflict(_) => StatusCode::CONFLICT,
        PaymentError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        PaymentError::AccountBlocked(_) => StatusCode::FORBIDDEN,
        PaymentError::ExternalService { .. } => StatusCode::BAD_GATEWAY,
        PaymentError::CircuitOpen { .. } => StatusCode::SERVICE_UNAVAILABLE,
        PaymentError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        PaymentError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status = status_for(&err);
        let message = match &err {
            PaymentError::Internal(source) => {
                tracing::error!(error = %source, "internal error");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };
        let body = ErrorBody {
            error: err.kind(),
            message,
        };
        (status, Json(body)).into_response()
    }
}
