use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Failure inside the optimization core.
///
/// Adapter-level failures (tool exits, decode errors, stat errors) are
/// logged and swallowed by the dispatcher — the original stays in the
/// running — so only `SourceUnreadable` and `Cancelled` ever reach a
/// caller.
#[derive(Debug, Error)]
pub enum OptimizeError {
    #[error("running {tool}: exit status {status}")]
    Tool {
        tool: &'static str,
        status: std::process::ExitStatus,
    },

    #[error("decoding image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("source unreadable: {0}")]
    SourceUnreadable(std::io::Error),

    #[error("optimization cancelled")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("optimization failed: {0}")]
    Optimize(#[from] OptimizeError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Optimize(_) | ApiError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "status": status.as_u16(),
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}
