//! Conversation store
//!
//! Owns the ordered message list and the transient "responding" flags. All
//! mutation goes through this module's narrow API; every mutation notifies
//! subscribers synchronously through a broadcast channel. No I/O happens
//! here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use thiserror::Error;
use tokio::sync::broadcast;

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Assistant,
}

/// One exchanged utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Unique within the conversation.
    pub id: String,
    pub sender: Sender,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    /// A user message with a fresh id.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            sender: Sender::User,
            text: text.into(),
            created_at: Utc::now(),
        }
    }

    /// An assistant message with a caller-chosen id (streamed replies reuse
    /// the reply identifier).
    pub fn assistant(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            sender: Sender::Assistant,
            text: text.into(),
            created_at: Utc::now(),
        }
    }
}

/// Snapshot of the transient UI flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags {
    /// A reply has been requested but not finished.
    pub response_in_flight: bool,
    /// A duplex link is being used for the in-flight reply.
    pub streaming_active: bool,
}

/// Notification emitted after every store mutation.
#[derive(Debug, Clone)]
pub enum StoreEvent {
    Appended { id: String },
    Updated { id: String },
    Replaced,
    Cleared,
    FlagsChanged(Flags),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("message identifier is empty")]
    EmptyId,
}

#[derive(Default)]
struct Inner {
    messages: Vec<ChatMessage>,
    flags: Flags,
}

/// The single shared conversation. Components hold `Arc<ConversationStore>`
/// and never a reference to the message list itself.
pub struct ConversationStore {
    inner: Mutex<Inner>,
    events: broadcast::Sender<StoreEvent>,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(128);
        Self {
            inner: Mutex::new(Inner::default()),
            events,
        }
    }

    /// Add a message to the end of the conversation.
    pub fn append(&self, message: ChatMessage) -> Result<(), StoreError> {
        if message.id.is_empty() {
            return Err(StoreError::EmptyId);
        }
        let id = message.id.clone();
        {
            let mut inner = self.inner.lock().unwrap();
            inner.messages.push(message);
        }
        self.notify(StoreEvent::Appended { id });
        Ok(())
    }

    /// Replace the whole conversation, preserving the given order. Used when
    /// hydrating history from the backend.
    pub fn replace_all(&self, messages: Vec<ChatMessage>) {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.messages = messages;
        }
        self.notify(StoreEvent::Replaced);
    }

    /// Append `chunk` verbatim to the message with `id`, creating a new
    /// assistant message seeded with `chunk` if none exists. The first
    /// fragment of a streamed reply both creates and seeds the message.
    pub fn append_assistant_fragment(&self, id: &str, chunk: &str) {
        let event;
        {
            let mut inner = self.inner.lock().unwrap();
            if let Some(msg) = inner.messages.iter_mut().find(|m| m.id == id) {
                msg.text.push_str(chunk);
                event = StoreEvent::Updated { id: id.to_string() };
            } else {
                inner.messages.push(ChatMessage::assistant(id, chunk));
                event = StoreEvent::Appended { id: id.to_string() };
            }
        }
        self.notify(event);
    }

    /// Remove every message. Explicit "clear conversation" action only.
    pub fn clear(&self) {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.messages.clear();
        }
        self.notify(StoreEvent::Cleared);
    }

    pub fn set_response_in_flight(&self, value: bool) {
        let flags = {
            let mut inner = self.inner.lock().unwrap();
            inner.flags.response_in_flight = value;
            inner.flags
        };
        self.notify(StoreEvent::FlagsChanged(flags));
    }

    pub fn set_streaming_active(&self, value: bool) {
        let flags = {
            let mut inner = self.inner.lock().unwrap();
            inner.flags.streaming_active = value;
            inner.flags
        };
        self.notify(StoreEvent::FlagsChanged(flags));
    }

    /// Snapshot of the ordered conversation.
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.inner.lock().unwrap().messages.clone()
    }

    /// Snapshot of the transient flags.
    pub fn flags(&self) -> Flags {
        self.inner.lock().unwrap().flags
    }

    /// Subscribe to mutation notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    fn notify(&self, event: StoreEvent) {
        // Send fails only when nobody is subscribed, which is fine.
        let _ = self.events.send(event);
    }
}
