use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use quota_core::Error as CoreError;

use super::types::ErrorResponse;

/// Wraps `quota_core::Error` so it can be returned directly from handlers
/// (spec §7 "Error propagation").
pub struct ApiError(pub CoreError);

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Spec §7: only BadRequest maps to 4xx. StoreUnavailable and
        // StoreInconsistent ("treated as transient... reported like
        // StoreUnavailable") both surface as 500 via `is_store_failure`;
        // ConfigInvalid reaching a handler would itself be a startup bug,
        // so it gets the same fallback.
        let status = if matches!(self.0, CoreError::BadRequest(_)) {
            StatusCode::BAD_REQUEST
        } else {
            debug_assert!(self.0.is_store_failure() || matches!(self.0, CoreError::ConfigInvalid(_)));
            StatusCode::INTERNAL_SERVER_ERROR
        };
        let body = Json(ErrorResponse {
            error: self.0.to_string(),
        });
        (status, body).into_response()
    }
}
