// Error taxonomy for the backend client.

use thiserror::Error;

/// Failures of the transport itself: nothing usable came back.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("backend request timed out")]
    Timeout,
    #[error("backend request failed: {0}")]
    Request(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else {
            TransportError::Request(e.to_string())
        }
    }
}

/// The backend answered with a non-2xx status.
///
/// `body` is the raw response text. It is only ever logged, never shown to a user.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Failed to {operation} ({status})")]
pub struct HttpError {
    pub operation: &'static str,
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("Failed to {operation}: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: TransportError,
    },

    #[error("Failed to {operation}: invalid JSON: {source}")]
    Json {
        operation: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid backend URL: {0}")]
    InvalidBaseUrl(String),
}

impl BackendError {
    /// The backend status code, when the backend answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            BackendError::Http(e) => Some(e.status),
            _ => None,
        }
    }

    pub fn operation(&self) -> Option<&'static str> {
        match self {
            BackendError::Http(e) => Some(e.operation),
            BackendError::Transport { operation, .. } | BackendError::Json { operation, .. } => {
                Some(*operation)
            }
            BackendError::InvalidBaseUrl(_) => None,
        }
    }
}
