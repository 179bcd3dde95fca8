//! API error types

use thiserror::Error;

/// Request/response failure with classification.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub message: String,
}

impl ApiError {
    pub fn new(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Network, message)
    }

    pub fn service(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Service, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::NotFound, message)
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ApiErrorKind::NotFound
    }
}

/// Classification used by callers to decide how loudly to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// Connection could not be established, or the request timed out.
    Network,
    /// The remote responded with a non-success status; carries its message.
    Service,
    /// History lookup for a user with no stored conversations. Not an
    /// error to surface; "start fresh" instead.
    NotFound,
}
