//! Streaming transport error types

use thiserror::Error;

/// Failures surfaced to callers of the streaming client. All of these are
/// handled by the session orchestrator (fallback or refusal); none are
/// shown to the user directly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// No resolved user identity; the link cannot be addressed.
    #[error("no authenticated user identity available")]
    NotAuthenticated,

    /// `send()` outside the connected-idle state.
    #[error("streaming link is not connected")]
    NotConnected,

    /// `send()` while a reply is already outstanding. Rejected rather than
    /// queued so two replies can never interleave into one message.
    #[error("a reply is already outstanding on this link")]
    ReplyOutstanding,

    /// Empty or whitespace-only user text, rejected before any transition.
    #[error("message text is empty")]
    EmptyMessage,

    /// The handshake failed.
    #[error("connection failed: {0}")]
    ConnectFailed(String),

    /// The session task is gone (after teardown).
    #[error("streaming session terminated")]
    Terminated,
}
