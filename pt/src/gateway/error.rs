//! Error taxonomy for the remote progress service

use thiserror::Error;

/// Failure modes of a call against the progress service
///
/// `Decode` covers malformed payloads: the caller must be able to treat
/// them as "unknown" rather than crash. `Rejected` is the moderation-style
/// refusal the service issues for content-gated writes.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("server returned {status}: {message}")]
    Server { status: u16, message: String },

    #[error("malformed response: {0}")]
    Decode(String),

    #[error("rejected by service: {reason}")]
    Rejected { reason: String },
}

impl RemoteError {
    /// Whether this failure means the service could not be reached at all
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}
