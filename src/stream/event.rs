//! Events that drive the link state machine

use super::frame::InboundFrame;

/// Everything that can move the session between states: explicit calls,
/// link lifecycle, inbound frames, and timer expirations. Delivered to the
/// session task one at a time.
#[derive(Debug, Clone)]
pub enum LinkEvent {
    /// `connect()` was called with a resolved identity.
    ConnectRequested,

    /// `send()` was called; the runtime minted `reply_id` beforehand.
    SendRequested {
        reply_id: String,
        text: String,
        system: Option<String>,
    },

    /// `disconnect()` was called (sign-out, teardown).
    DisconnectRequested,

    /// The handshake finished.
    Opened,

    /// The handshake failed.
    OpenFailed { reason: String },

    /// A classified inbound payload arrived.
    Frame { frame: InboundFrame },

    /// The link closed without an explicit `disconnect()`.
    Closed,

    /// The idle-completion window elapsed for `reply_id`.
    IdleElapsed { reply_id: String },

    /// The hard response ceiling elapsed for `reply_id`.
    CeilingElapsed { reply_id: String },

    /// The reconnect backoff for attempt `attempt` elapsed.
    ReconnectDue { attempt: u32 },
}
