use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Invalid allowlist entry: {0}")]
    InvalidAllowlist(String),

    #[error("Failed to establish file watch: {0}")]
    WatchEstablishment(String),

    #[error("Invalid port value: {0}")]
    PortParse(String),

    #[error("Authentication failed with status {0}")]
    AuthenticationFailed(u16),

    #[error("Remote update failed with status {status}: {body}")]
    RemoteUpdateFailed { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Access denied for {0}")]
    AccessDenied(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SyncResult<T> = Result<T, SyncError>;

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        SyncError::Transport(err.to_string())
    }
}

impl From<notify::Error> for SyncError {
    fn from(err: notify::Error) -> Self {
        SyncError::WatchEstablishment(err.to_string())
    }
}

impl IntoResponse for SyncError {
    fn into_response(self) -> Response {
        let status = match &self {
            SyncError::AccessDenied(_) => StatusCode::FORBIDDEN,
            SyncError::AuthenticationFailed(_)
            | SyncError::RemoteUpdateFailed { .. }
            | SyncError::Transport(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({
            "error": self.to_string(),
            "code": status.as_u16(),
        });

        (status, Json(body)).into_response()
    }
}
