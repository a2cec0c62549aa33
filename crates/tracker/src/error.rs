//! Error types for tracker operations.

use thiserror::Error;

/// Failure modes of a remote tracker call.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// Network-level failure: connect, TLS, timeout. Always retryable.
    #[error("HTTP transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    /// The tracker answered with a non-success status.
    #[error("tracker API error: {status} - {message}")]
    Api {
        /// HTTP status code returned by the tracker.
        status: u16,
        /// Error message decoded from the response body.
        message: String,
    },

    /// A label the caller tried to attach does not exist in the target
    /// repository. Callers on best-effort paths catch and ignore this.
    #[error("label not configured on {repo}: {label}")]
    LabelNotConfigured {
        /// Repository that lacks the label.
        repo: String,
        /// The label that could not be attached.
        label: String,
    },

    /// A repository name that is not of the form `owner/repo`.
    #[error("invalid repository name: {0}")]
    InvalidRepo(String),
}

impl TrackerError {
    /// Whether the caller's redelivery mechanism may retry the operation.
    ///
    /// Transport failures and auth/rate-limit/server-side statuses are
    /// retryable; everything else is a permanent condition for this payload.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Api { status, .. } => {
                matches!(*status, 401 | 403 | 429) || *status >= 500
            }
            Self::LabelNotConfigured { .. } | Self::InvalidRepo(_) => false,
        }
    }
}
