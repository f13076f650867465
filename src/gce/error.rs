//! Error types for the Compute Engine client.

use thiserror::Error;

use crate::compute::{ProviderError, TargetError};

/// Error reasons the API uses when a resource is in the wrong state.
const CONFLICT_REASONS: &[&str] = &[
    "conflict",
    "resourceNotReady",
    "conditionNotMet",
    "resourceInUseByAnotherResource",
    "alreadyExists",
];

/// Errors raised by the Compute Engine client.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum GceError {
    /// Raised when an access token cannot be obtained.
    #[error("authentication failed: {message}")]
    Auth {
        /// Description of the failure.
        message: String,
    },
    /// Raised when the request never produced an HTTP response.
    #[error("transport error: {message}")]
    Transport {
        /// Message returned by the HTTP client.
        message: String,
    },
    /// Raised when the API answered with an error status.
    #[error("compute API returned {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// First error reason in the response envelope, when present.
        reason: Option<String>,
        /// Error message from the response envelope.
        message: String,
    },
    /// Raised when the requested resource does not exist.
    #[error("{resource} not found")]
    NotFound {
        /// Resource path that was requested.
        resource: String,
    },
    /// Raised when a response body cannot be decoded.
    #[error("failed to decode compute API response: {message}")]
    Decode {
        /// Parser error message.
        message: String,
    },
    /// Raised when the endpoint URL cannot be built.
    #[error("invalid endpoint: {message}")]
    Endpoint {
        /// Description of the failure.
        message: String,
    },
}

impl ProviderError for GceError {
    fn is_conflict(&self) -> bool {
        match self {
            Self::Api { status, reason, .. } => {
                matches!(status, 409 | 412)
                    || reason
                        .as_deref()
                        .is_some_and(|value| CONFLICT_REASONS.contains(&value))
            }
            _ => false,
        }
    }
}

impl From<reqwest::Error> for GceError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport {
            message: value.to_string(),
        }
    }
}

impl From<TargetError> for GceError {
    fn from(value: TargetError) -> Self {
        Self::Endpoint {
            message: value.to_string(),
        }
    }
}
