//! Failure taxonomy for the rulebook pipeline.
//!
//! Every fallible step returns `Result<T, QaError>`. Session handlers turn
//! an error into exactly one sidebar [`Notice`](crate::models::Notice) with
//! the level given by [`QaError::level`]; nothing is allowed to escape as a
//! panic or a 5xx response.

use thiserror::Error;

use crate::models::NoticeLevel;

/// Result alias used across the pipeline.
pub type Result<T> = std::result::Result<T, QaError>;

#[derive(Debug, Error)]
pub enum QaError {
    /// The upload filename does not encode a catalog ID.
    #[error("cannot read a catalog ID from '{0}'; expected <ID>_<type>.pdf or <ID>.pdf")]
    BadFilename(String),

    /// The catalog answered with its generic error page.
    #[error("catalog ID {0} was not found")]
    GameNotFound(String),

    /// Network or parse failure while resolving the game title.
    #[error("catalog lookup failed: {0}")]
    Catalog(String),

    /// Malformed, unreadable or text-less PDF.
    #[error("could not extract text from '{file}': {reason}")]
    Extraction { file: String, reason: String },

    /// Index or namespace operation failed.
    #[error("vector store error: {0}")]
    VectorStore(String),

    /// Bad credential, quota or network failure on the model API.
    #[error("language model error: {0}")]
    LanguageModel(String),

    /// The credential was rejected by the validity check.
    #[error("the API key was rejected: {0}")]
    InvalidKey(String),

    /// The action needs a state the session is not in.
    #[error("{0}")]
    Precondition(String),
}

impl QaError {
    /// Sidebar level used when this error is shown to the user.
    pub fn level(&self) -> NoticeLevel {
        match self {
            QaError::BadFilename(_)
            | QaError::GameNotFound(_)
            | QaError::InvalidKey(_)
            | QaError::Precondition(_)
            | QaError::Catalog(_)
            | QaError::Extraction { .. } => NoticeLevel::Warning,
            QaError::VectorStore(_) | QaError::LanguageModel(_) => NoticeLevel::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identification_failures_are_warnings() {
        assert_eq!(
            QaError::GameNotFound("1".into()).level(),
            NoticeLevel::Warning
        );
        assert_eq!(
            QaError::BadFilename("x.pdf".into()).level(),
            NoticeLevel::Warning
        );
    }

    #[test]
    fn service_failures_are_errors() {
        assert_eq!(QaError::VectorStore("x".into()).level(), NoticeLevel::Error);
        assert_eq!(
            QaError::LanguageModel("x".into()).level(),
            NoticeLevel::Error
        );
    }
}
