//! Request/response client for the assistant service
//!
//! The non-streaming path: one-shot conversation turns and history
//! retrieval. Used as the fallback when the streaming transport is
//! unavailable and for hydrating past conversations.

mod client;
mod error;
mod types;

pub use client::AssistantApi;
pub use error::{ApiError, ApiErrorKind};
pub use types::{HistoryTurn, TurnMessage, TurnReply, TurnRequest, TurnRole};

use async_trait::async_trait;

/// Interface to the assistant's request/response endpoints.
///
/// Retry policy is deliberately absent here; the session orchestrator
/// decides what happens after a failure.
#[async_trait]
pub trait AssistantBackend: Send + Sync {
    /// Send one full conversation turn and wait for the complete reply.
    async fn send_turn(&self, request: &TurnRequest) -> Result<TurnReply, ApiError>;

    /// Fetch past turns for a user, newest last. "No history" is reported
    /// as [`ApiErrorKind::NotFound`]; callers treat it as a valid empty
    /// result.
    async fn fetch_history(
        &self,
        identity: &str,
        limit: usize,
    ) -> Result<Vec<HistoryTurn>, ApiError>;
}
