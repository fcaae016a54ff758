pub mod chat;
pub mod research;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::core::jobs::JobError;

impl IntoResponse for JobError {
    fn into_response(self) -> Response {
        let status = match &self {
            JobError::NotFound(_) => StatusCode::NOT_FOUND,
            JobError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            JobError::InvalidTransition { .. } => StatusCode::CONFLICT,
            JobError::Upstream(_) => StatusCode::BAD_GATEWAY,
        };
        if status.is_server_error() {
            warn!("Request failed: {}", self);
        }
        (
            status,
            Json(serde_json::json!({ "success": false, "error": self.to_string() })),
        )
            .into_response()
    }
}
