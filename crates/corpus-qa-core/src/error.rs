//! Error taxonomy for the answering pipeline and its collaborators.

use thiserror::Error;

/// Non-success outcomes of answering one question.
///
/// Only `Validation` and `NoRelevantInfo` are distinguished; every
/// embedding, search, or generation failure collapses into `Processing`,
/// which keeps the underlying error for logging.
#[derive(Debug, Error)]
pub enum AskError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("no relevant information found to answer the question")]
    NoRelevantInfo,

    #[error("failed to process the question")]
    Processing(#[source] anyhow::Error),
}

impl AskError {
    /// Machine-readable code used by the HTTP error contract.
    pub fn code(&self) -> &'static str {
        match self {
            AskError::Validation(_) => "bad_request",
            AskError::NoRelevantInfo => "no_relevant_info",
            AskError::Processing(_) => "processing_failed",
        }
    }
}

/// An upstream service answered, but with an empty or malformed payload.
///
/// Returned inside `anyhow::Error`; callers that care can `downcast_ref`.
#[derive(Debug, Error)]
#[error("malformed response from {service}: {detail}")]
pub struct MalformedResponse {
    pub service: &'static str,
    pub detail: String,
}

impl MalformedResponse {
    pub fn new(service: &'static str, detail: impl Into<String>) -> Self {
        Self {
            service,
            detail: detail.into(),
        }
    }
}
