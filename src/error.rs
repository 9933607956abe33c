//! Error types for punchcard

use thiserror::Error;

use crate::types::SourceKind;

/// Errors that can occur while resolving, fetching, or opening a resource
#[derive(Debug, Error)]
pub enum RetrieveError {
    #[error("Resource cannot be empty")]
    InvalidInput,

    #[error("Unknown resource format: {0}")]
    UnknownFormat(String),

    #[error("Invalid {kind} resource '{resource}'. Expected '{expected}'")]
    InvalidResource {
        kind: SourceKind,
        expected: &'static str,
        resource: String,
    },

    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("Could not open {url}: {reason}")]
    Open { url: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl RetrieveError {
    pub(crate) fn invalid_resource(kind: SourceKind, resource: &str) -> Self {
        RetrieveError::InvalidResource {
            kind,
            expected: kind.expected_format(),
            resource: resource.to_string(),
        }
    }

    pub(crate) fn fetch(message: impl Into<String>) -> Self {
        RetrieveError::Fetch(message.into())
    }
}

impl From<reqwest::Error> for RetrieveError {
    fn from(e: reqwest::Error) -> Self {
        RetrieveError::Fetch(e.to_string())
    }
}
