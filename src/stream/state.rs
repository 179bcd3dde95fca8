//! Link state types

/// State of the per-user connection session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LinkState {
    /// No link and none being opened.
    #[default]
    Disconnected,

    /// Handshake in progress. `attempt` is the reconnect ordinal; 0 is a
    /// user-initiated connect.
    Connecting { attempt: u32 },

    /// Link established, no reply outstanding.
    Idle,

    /// Link established, one reply streaming in.
    AwaitingReply { reply_id: String },

    /// Link lost; reconnect attempt `attempt` is scheduled.
    Reconnecting { attempt: u32 },

    /// Reconnect attempts exhausted. Sends must go through the fallback
    /// path until an explicit `connect()`.
    GaveUp,
}

impl LinkState {
    /// Whether the underlying link is established.
    #[allow(dead_code)] // State query utility
    pub fn is_connected(&self) -> bool {
        matches!(self, LinkState::Idle | LinkState::AwaitingReply { .. })
    }

    /// The outstanding reply identifier, if a reply is streaming.
    pub fn outstanding_reply(&self) -> Option<&str> {
        match self {
            LinkState::AwaitingReply { reply_id } => Some(reply_id),
            _ => None,
        }
    }
}
