//! Domain errors that callers need to tell apart.
//!
//! Pipeline functions return `anyhow::Result`; when a failure has a meaning
//! beyond "something broke" it is raised as a [`StudyError`] so the HTTP
//! layer can recover it with `downcast_ref` and pick a status code.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StudyError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{0} provider is disabled; set it in the config")]
    ProviderDisabled(&'static str),

    #[error("upload exceeds limit of {limit} bytes")]
    TooLarge { limit: usize },

    #[error("no extractable text in coursebook {0}")]
    NoText(String),

    #[error("upstream error: {0}")]
    Upstream(String),
}

impl StudyError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        StudyError::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        StudyError::InvalidInput(message.into())
    }
}
