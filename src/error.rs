//! Error types for the gallery client.

use thiserror::Error;

const DEFAULT_FETCH_MESSAGE: &str = "Failed to load photos";

/// Failure while fetching data from the gallery backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// The backend answered but refused the request.
    #[error("request rejected{}: {}", status_suffix(.status), message_or_default(.message))]
    Rejected {
        status: Option<u16>,
        message: Option<String>,
    },

    #[error("network error: {0}")]
    Transport(String),

    #[error("invalid response: {0}")]
    Decode(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({})", s)).unwrap_or_default()
}

fn message_or_default(message: &Option<String>) -> &str {
    message.as_deref().unwrap_or(DEFAULT_FETCH_MESSAGE)
}

impl FetchError {
    /// Application-level rejection carrying the backend's message, if any.
    pub fn rejected(message: impl Into<String>) -> Self {
        FetchError::Rejected {
            status: None,
            message: Some(message.into()),
        }
    }

    /// Message suitable for showing to a user.
    pub fn user_message(&self) -> String {
        match self {
            FetchError::Rejected { message: Some(m), .. } if !m.trim().is_empty() => m.clone(),
            FetchError::Rejected { .. } => DEFAULT_FETCH_MESSAGE.to_string(),
            FetchError::Transport(m) | FetchError::Decode(m) => m.clone(),
        }
    }
}

/// Invalid container reference or sort order given on the command line or in config.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseRefError {
    #[error("unknown container kind '{0}' (expected directory, gallery, place, face, favorites or search)")]
    UnknownKind(String),

    #[error("'{0}' requires a value, e.g. {0}:42")]
    MissingValue(String),

    #[error("invalid container id '{0}'")]
    InvalidId(String),

    #[error("invalid sort order '{0}' (expected asc or desc)")]
    SortOrder(String),
}
