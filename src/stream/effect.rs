//! Effects produced by link transitions

use super::frame::OutboundFrame;
use std::time::Duration;

/// Side effects the session task executes after a transition. The
/// transition function itself never touches I/O, the store, or timers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Open a duplex link for the session identity.
    OpenLink,

    /// Transmit an outbound frame. Fire-and-forget; no acknowledgment is
    /// awaited.
    Transmit { frame: OutboundFrame },

    /// Drop the current link, if any.
    CloseLink,

    /// Append fragment text verbatim to the outstanding assistant message.
    AppendFragment { reply_id: String, text: String },

    /// Clear both of the store's "responding" flags.
    ClearResponding,

    /// (Re)start the idle-completion timer for the reply.
    ArmIdleTimer { reply_id: String },

    /// Start the hard response-ceiling timer for the reply.
    ArmCeilingTimer { reply_id: String },

    /// Cancel the idle and ceiling timers.
    CancelReplyTimers,

    /// Schedule reconnect attempt `attempt` after `delay`.
    ScheduleReconnect { attempt: u32, delay: Duration },

    /// Cancel a scheduled reconnect.
    CancelReconnect,
}
