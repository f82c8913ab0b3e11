use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use mersul_core::AppError;

use crate::dto::ErrorResponse;

/// Wrapper so we can implement `IntoResponse` for `AppError`.
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self.0 {
            AppError::TrainNotRunning { .. } => (StatusCode::NOT_FOUND, "train_not_running"),
            AppError::NoItineraries { .. } => (StatusCode::NOT_FOUND, "no_itineraries"),
            AppError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
            AppError::Fetch(_) => (StatusCode::INTERNAL_SERVER_ERROR, "fetch_error"),
            AppError::Parse(_) => (StatusCode::INTERNAL_SERVER_ERROR, "parse_error"),
            AppError::SchemaValidation(_) => (StatusCode::INTERNAL_SERVER_ERROR, "validation_error"),
            AppError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "store_error"),
            AppError::Serialization(_) => (StatusCode::INTERNAL_SERVER_ERROR, "serialization_error"),
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
        };

        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        }

        let body = ErrorResponse {
            error: error_type.to_string(),
            message: self.0.to_string(),
        };

        (status, axum::Json(body)).into_response()
    }
}
