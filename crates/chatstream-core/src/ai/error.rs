//! Wire boundary errors

use reqwest::StatusCode;
use serde::Deserialize;

/// Shown when an error response carries no readable body
pub const COMMUNICATION_ERROR: &str = "Errore di comunicazione con il server";

/// Errors surfaced by the assistant service transport.
///
/// Display text is what the user sees after the `"Errore: "` prefix, so each
/// variant renders just its message.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Network/connection failure from the HTTP client (includes timeouts)
    #[error("{0}")]
    Transport(#[from] reqwest::Error),
    /// Server answered with a non-success status
    #[error("{message}")]
    Status { status: StatusCode, message: String },
    /// Transport failure not produced by the HTTP client
    #[error("{0}")]
    Connection(String),
    /// Path has an extension outside pdf/xlsx/xls; the path is kept for logs
    #[error("Formato non supportato. Usa PDF, XLSX o XLS.")]
    UnsupportedDocument(String),
    #[error("failed to read document: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport(e) => e.status(),
            _ => None,
        }
    }
}

/// Error body produced by the backend's exception handler
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Pick the user-facing message out of an error response body
pub fn parse_error_message(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            message: Some(message),
        }) if !message.is_empty() => message,
        Ok(_) => format!("HTTP {}", status.as_u16()),
        Err(_) => COMMUNICATION_ERROR.to_string(),
    }
}
