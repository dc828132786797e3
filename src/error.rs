//! Error taxonomy for the library core.
//!
//! Every fallible operation in the stores, the learner and the playback
//! controller reports one of four categories. None of them is fatal on its own:
//! the interactive loop reports the message and keeps going, and only
//! end-of-input ends a session.

use thiserror::Error;

/// Result alias used throughout the library core.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Cache miss or absent record. Callers supply a default or re-extract.
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed command, bad tempo, reversed range, invalid score data.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The extractor, renderer or correction step failed.
    #[error("{collaborator} failed: {message}")]
    Collaborator {
        collaborator: &'static str,
        message: String,
    },

    /// The backing database is unavailable or rejected the write.
    #[error("storage failure: {0}")]
    Storage(String),
}

impl Error {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn collaborator(collaborator: &'static str, message: impl Into<String>) -> Self {
        Self::Collaborator {
            collaborator,
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    #[must_use]
    pub const fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Storage(format!("stored JSON is unreadable: {err}"))
    }
}
