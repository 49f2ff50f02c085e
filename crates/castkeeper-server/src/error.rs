use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use castkeeper_core::error::CastkeeperError;

// ---------------------------------------------------------------------------
// AppError
// ---------------------------------------------------------------------------

/// Unified error type for HTTP responses. Bodies are `{ "error": "..." }`.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    pub fn internal(msg: impl std::fmt::Display) -> Self {
        Self(anyhow::anyhow!("{msg}"))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self.0.downcast_ref::<CastkeeperError>() {
            Some(CastkeeperError::ConfigNotFound(_)) => StatusCode::NOT_FOUND,
            Some(CastkeeperError::InvalidConfig(_) | CastkeeperError::InvalidSchedule(_)) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Some(CastkeeperError::Production(_) | CastkeeperError::ProductionRequest { .. }) => {
                StatusCode::BAD_GATEWAY
            }
            Some(CastkeeperError::Http(_)) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
