//! Session orchestrator
//!
//! Decides, per user message, whether the streaming path or the
//! request/response fallback serves the reply, and keeps the conversation
//! store's flags honest throughout. Also hydrates past conversations at
//! startup.

use crate::api::{ApiError, AssistantBackend, TurnMessage, TurnRequest, TurnRole};
use crate::identity::IdentitySource;
use crate::store::{ChatMessage, ConversationStore, Sender};
use crate::stream::{LinkState, StreamError, StreamingChat};
use std::sync::Arc;

/// Appended when both the streaming and fallback paths fail, so the
/// exchange stays legible in the conversation instead of vanishing.
const FALLBACK_APOLOGY: &str =
    "Sorry, I'm having trouble reaching campus services right now. Please try again in a moment.";

/// Per-user chat session: one conversation store, one streaming link, one
/// fallback backend. All collaborators are injected at construction.
pub struct ChatSession {
    store: Arc<ConversationStore>,
    stream: StreamingChat,
    backend: Arc<dyn AssistantBackend>,
    identity: Arc<dyn IdentitySource>,
    system_prompt: String,
}

impl ChatSession {
    pub fn new(
        store: Arc<ConversationStore>,
        stream: StreamingChat,
        backend: Arc<dyn AssistantBackend>,
        identity: Arc<dyn IdentitySource>,
        system_prompt: String,
    ) -> Self {
        Self {
            store,
            stream,
            backend,
            identity,
            system_prompt,
        }
    }

    /// Submit one user message. The user message is appended locally no
    /// matter what; the reply then arrives either as streamed fragments
    /// (observed through the store) or, on fallback, as one complete
    /// message before this returns. A fallback failure is terminal for the
    /// turn: the apology is appended and the user must resubmit.
    pub async fn submit(&self, text: &str) {
        if text.trim().is_empty() {
            return;
        }

        if let Err(error) = self.store.append(ChatMessage::user(text)) {
            tracing::error!(%error, "failed to record user message");
            return;
        }
        self.store.set_response_in_flight(true);

        match self.try_streaming(text).await {
            Ok(reply_id) => {
                self.store.set_streaming_active(true);
                tracing::debug!(reply_id = %reply_id, "reply streaming");
            }
            Err(error) => {
                tracing::debug!(%error, "streaming unavailable, using fallback");
                self.fallback().await;
            }
        }
    }

    /// Replace the local conversation with the user's stored history. A
    /// user with no server-side history hydrates nothing and reports
    /// success; local messages are left untouched in that case.
    pub async fn hydrate_history(&self, limit: usize) -> Result<(), ApiError> {
        let Some(identity) = self.identity.identity() else {
            tracing::debug!("history hydration skipped: not signed in");
            return Ok(());
        };

        match self.backend.fetch_history(&identity, limit).await {
            Ok(turns) => {
                let mut messages = Vec::with_capacity(turns.len() * 2);
                for turn in turns {
                    messages.push(ChatMessage::user(turn.user_message));
                    messages.push(ChatMessage::assistant(
                        uuid::Uuid::new_v4().to_string(),
                        turn.assistant_response,
                    ));
                }
                self.store.replace_all(messages);
                Ok(())
            }
            Err(error) if error.is_not_found() => {
                tracing::debug!("no stored history; starting fresh");
                Ok(())
            }
            Err(error) => Err(error),
        }
    }

    /// Tear down the streaming session (sign-out, shutdown).
    pub async fn shutdown(&self) {
        self.stream.disconnect().await;
    }

    async fn try_streaming(&self, text: &str) -> Result<String, StreamError> {
        // A session that gave up stays on the fallback path until an
        // explicit reconnect; only a fresh session is auto-connected.
        if matches!(self.stream.state().await, LinkState::Disconnected) {
            self.stream.connect().await?;
        }
        self.stream.send(text, Some(&self.system_prompt)).await
    }

    /// One request/response attempt for the turn already recorded in the
    /// store. Both outcomes clear the responding flags directly; no
    /// streaming happened.
    async fn fallback(&self) {
        let reply_text = match self.identity.identity() {
            Some(identity) => match self.backend.send_turn(&self.turn_request(&identity)).await {
                Ok(reply) => reply.text,
                Err(error) => {
                    tracing::warn!(%error, "fallback turn failed");
                    FALLBACK_APOLOGY.to_string()
                }
            },
            None => {
                tracing::warn!("fallback skipped: no authenticated identity");
                FALLBACK_APOLOGY.to_string()
            }
        };

        let message = ChatMessage::assistant(uuid::Uuid::new_v4().to_string(), reply_text);
        if let Err(error) = self.store.append(message) {
            tracing::error!(%error, "failed to record assistant reply");
        }
        self.store.set_response_in_flight(false);
        self.store.set_streaming_active(false);
    }

    /// Full conversation context: system prompt first, then every recorded
    /// message in order. The newest user message is already in the store.
    fn turn_request(&self, identity: &str) -> TurnRequest {
        let mut messages = vec![TurnMessage::new(TurnRole::System, &self.system_prompt)];
        for message in self.store.messages() {
            let role = match message.sender {
                Sender::User => TurnRole::User,
                Sender::Assistant => TurnRole::Assistant,
            };
            messages.push(TurnMessage::new(role, message.text));
        }
        TurnRequest::new(identity, messages)
    }
}
