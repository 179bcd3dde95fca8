//! Pure link state transitions
//!
//! Given the current state and one event, produce the next state and the
//! effects the session task must execute. No I/O, no clocks, no store
//! access happens here, which is what makes the machine testable without a
//! network.

use super::{Effect, InboundFrame, LinkEvent, LinkState, OutboundFrame, StreamError};
use std::time::Duration;

/// Reconnect attempts after a failed or dropped link before giving up.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Fragment silence after which a reply is considered finished.
pub(crate) const IDLE_COMPLETION_WINDOW: Duration = Duration::from_secs(2);

/// Upper bound on how long a reply may stay outstanding, independent of
/// fragment activity. Guarantees the "responding" flags always clear.
pub(crate) const RESPONSE_CEILING: Duration = Duration::from_secs(15);

/// Fragment length beyond which the completion heuristic fires.
const COMPLETION_LENGTH: usize = 100;

/// Backoff before reconnect attempt `attempt` (1-based). The policy is a
/// fixed delay; the attempt count bounds the ladder, not the spacing.
pub fn reconnect_delay(_attempt: u32) -> Duration {
    Duration::from_secs(2)
}

/// Whether a fragment looks like the end of a reply. The wire protocol does
/// not guarantee an explicit end-of-stream frame, so sentence-final
/// punctuation and unusually large fragments end the reply early; the idle
/// window and the response ceiling cover everything else.
fn looks_complete(fragment: &str) -> bool {
    fragment.ends_with('.')
        || fragment.ends_with('!')
        || fragment.ends_with('?')
        || fragment.ends_with("\n\n")
        || fragment.len() > COMPLETION_LENGTH
}

/// Result of a transition.
#[derive(Debug)]
pub struct TransitionResult {
    pub state: LinkState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: LinkState) -> Self {
        Self {
            state,
            effects: vec![],
        }
    }

    /// Stay in the current state with no effects (stale or stray event).
    pub fn unchanged(state: &LinkState) -> Self {
        Self::new(state.clone())
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Pure transition function. `Err` is returned only for rejected calls
/// (`send` outside the idle-connected state); every other event resolves to
/// a state, possibly unchanged.
#[allow(clippy::too_many_lines)] // One arm per transition reads better split up
pub fn transition(
    state: &LinkState,
    event: LinkEvent,
) -> Result<TransitionResult, StreamError> {
    match (state, event) {
        // ============================================================
        // Connecting
        // ============================================================
        (LinkState::Disconnected | LinkState::GaveUp, LinkEvent::ConnectRequested) => Ok(
            TransitionResult::new(LinkState::Connecting { attempt: 0 })
                .with_effect(Effect::OpenLink),
        ),

        // An explicit connect while a reconnect is pending jumps the queue
        // and restarts the attempt ladder.
        (LinkState::Reconnecting { .. }, LinkEvent::ConnectRequested) => Ok(
            TransitionResult::new(LinkState::Connecting { attempt: 0 })
                .with_effect(Effect::CancelReconnect)
                .with_effect(Effect::OpenLink),
        ),

        // Already connecting or connected: no-op, the caller sees the
        // existing session's state.
        (
            LinkState::Connecting { .. } | LinkState::Idle | LinkState::AwaitingReply { .. },
            LinkEvent::ConnectRequested,
        ) => Ok(TransitionResult::unchanged(state)),

        (LinkState::Connecting { .. }, LinkEvent::Opened) => {
            Ok(TransitionResult::new(LinkState::Idle))
        }

        // Handshake failure: schedule the next attempt or give up.
        (
            LinkState::Connecting { attempt },
            LinkEvent::OpenFailed { .. } | LinkEvent::Closed,
        ) => {
            if *attempt >= MAX_RECONNECT_ATTEMPTS {
                Ok(TransitionResult::new(LinkState::GaveUp))
            } else {
                let next = attempt + 1;
                Ok(
                    TransitionResult::new(LinkState::Reconnecting { attempt: next })
                        .with_effect(Effect::ScheduleReconnect {
                            attempt: next,
                            delay: reconnect_delay(next),
                        }),
                )
            }
        }

        (LinkState::Reconnecting { attempt }, LinkEvent::ReconnectDue { attempt: due })
            if due == *attempt =>
        {
            Ok(
                TransitionResult::new(LinkState::Connecting { attempt: *attempt })
                    .with_effect(Effect::OpenLink),
            )
        }

        // ============================================================
        // Sending
        // ============================================================
        (
            LinkState::Idle,
            LinkEvent::SendRequested {
                reply_id,
                text,
                system,
            },
        ) => Ok(TransitionResult::new(LinkState::AwaitingReply {
            reply_id: reply_id.clone(),
        })
        .with_effect(Effect::Transmit {
            frame: OutboundFrame {
                message: text,
                system,
            },
        })
        .with_effect(Effect::ArmCeilingTimer { reply_id })),

        (LinkState::AwaitingReply { .. }, LinkEvent::SendRequested { .. }) => {
            Err(StreamError::ReplyOutstanding)
        }

        (_, LinkEvent::SendRequested { .. }) => Err(StreamError::NotConnected),

        // ============================================================
        // Inbound frames
        // ============================================================
        (LinkState::AwaitingReply { reply_id }, LinkEvent::Frame { frame }) => match frame {
            InboundFrame::Fragment(text) => {
                let finished = looks_complete(&text);
                let append = Effect::AppendFragment {
                    reply_id: reply_id.clone(),
                    text,
                };
                if finished {
                    Ok(TransitionResult::new(LinkState::Idle).with_effects([
                        append,
                        Effect::CancelReplyTimers,
                        Effect::ClearResponding,
                    ]))
                } else {
                    Ok(TransitionResult::unchanged(state).with_effects([
                        append,
                        Effect::ArmIdleTimer {
                            reply_id: reply_id.clone(),
                        },
                    ]))
                }
            }
            InboundFrame::Complete | InboundFrame::ServiceError(_) => {
                Ok(TransitionResult::new(LinkState::Idle)
                    .with_effect(Effect::CancelReplyTimers)
                    .with_effect(Effect::ClearResponding))
            }
            InboundFrame::Noise => Ok(TransitionResult::unchanged(state)),
        },

        // ============================================================
        // Reply timers
        // ============================================================
        (
            LinkState::AwaitingReply { reply_id },
            LinkEvent::IdleElapsed { reply_id: rid } | LinkEvent::CeilingElapsed { reply_id: rid },
        ) if rid == *reply_id => Ok(TransitionResult::new(LinkState::Idle)
            .with_effect(Effect::CancelReplyTimers)
            .with_effect(Effect::ClearResponding)),

        // ============================================================
        // Link loss
        // ============================================================
        (LinkState::Idle, LinkEvent::Closed) => Ok(TransitionResult::new(
            LinkState::Reconnecting { attempt: 1 },
        )
        .with_effect(Effect::CloseLink)
        .with_effect(Effect::ScheduleReconnect {
            attempt: 1,
            delay: reconnect_delay(1),
        })),

        // The outstanding reply is abandoned; the partial text already in
        // the store stays as-is (no rollback).
        (LinkState::AwaitingReply { .. }, LinkEvent::Closed) => Ok(TransitionResult::new(
            LinkState::Reconnecting { attempt: 1 },
        )
        .with_effects([
            Effect::CancelReplyTimers,
            Effect::ClearResponding,
            Effect::CloseLink,
            Effect::ScheduleReconnect {
                attempt: 1,
                delay: reconnect_delay(1),
            },
        ])),

        // ============================================================
        // Explicit disconnect
        // ============================================================
        (_, LinkEvent::DisconnectRequested) => {
            Ok(TransitionResult::new(LinkState::Disconnected).with_effects([
                Effect::CancelReplyTimers,
                Effect::CancelReconnect,
                Effect::CloseLink,
                Effect::ClearResponding,
            ]))
        }

        // Everything else is stale or stray: timer events for finished
        // replies, reconnect ticks superseded by an explicit connect,
        // frames with no reply outstanding, link noise after teardown.
        (_, _) => Ok(TransitionResult::unchanged(state)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn awaiting(reply_id: &str) -> LinkState {
        LinkState::AwaitingReply {
            reply_id: reply_id.to_string(),
        }
    }

    fn send_event(reply_id: &str) -> LinkEvent {
        LinkEvent::SendRequested {
            reply_id: reply_id.to_string(),
            text: "events today?".to_string(),
            system: None,
        }
    }

    fn fragment(text: &str) -> LinkEvent {
        LinkEvent::Frame {
            frame: InboundFrame::Fragment(text.to_string()),
        }
    }

    #[test]
    fn connect_from_disconnected_opens_link() {
        let result = transition(&LinkState::Disconnected, LinkEvent::ConnectRequested).unwrap();
        assert_eq!(result.state, LinkState::Connecting { attempt: 0 });
        assert_eq!(result.effects, vec![Effect::OpenLink]);
    }

    #[test]
    fn connect_while_connected_is_a_noop() {
        for state in [
            LinkState::Connecting { attempt: 2 },
            LinkState::Idle,
            awaiting("r-1"),
        ] {
            let result = transition(&state, LinkEvent::ConnectRequested).unwrap();
            assert_eq!(result.state, state);
            assert!(result.effects.is_empty());
        }
    }

    #[test]
    fn connect_from_gave_up_restarts_ladder() {
        let result = transition(&LinkState::GaveUp, LinkEvent::ConnectRequested).unwrap();
        assert_eq!(result.state, LinkState::Connecting { attempt: 0 });
    }

    #[test]
    fn opened_lands_idle() {
        let state = LinkState::Connecting { attempt: 3 };
        let result = transition(&state, LinkEvent::Opened).unwrap();
        assert_eq!(result.state, LinkState::Idle);
    }

    #[test]
    fn send_transmits_and_arms_ceiling() {
        let result = transition(&LinkState::Idle, send_event("r-1")).unwrap();
        assert_eq!(result.state, awaiting("r-1"));
        assert_eq!(
            result.effects,
            vec![
                Effect::Transmit {
                    frame: OutboundFrame {
                        message: "events today?".to_string(),
                        system: None,
                    },
                },
                Effect::ArmCeilingTimer {
                    reply_id: "r-1".to_string(),
                },
            ]
        );
    }

    #[test]
    fn send_while_outstanding_is_rejected() {
        let result = transition(&awaiting("r-1"), send_event("r-2"));
        assert_eq!(result.unwrap_err(), StreamError::ReplyOutstanding);
    }

    #[test]
    fn send_while_not_connected_is_rejected() {
        for state in [
            LinkState::Disconnected,
            LinkState::Connecting { attempt: 0 },
            LinkState::Reconnecting { attempt: 1 },
            LinkState::GaveUp,
        ] {
            let result = transition(&state, send_event("r-1"));
            assert_eq!(result.unwrap_err(), StreamError::NotConnected);
        }
    }

    #[test]
    fn fragment_appends_and_rearms_idle_timer() {
        let result = transition(&awaiting("r-1"), fragment("There are")).unwrap();
        assert_eq!(result.state, awaiting("r-1"));
        assert_eq!(
            result.effects,
            vec![
                Effect::AppendFragment {
                    reply_id: "r-1".to_string(),
                    text: "There are".to_string(),
                },
                Effect::ArmIdleTimer {
                    reply_id: "r-1".to_string(),
                },
            ]
        );
    }

    #[test]
    fn sentence_final_fragment_finishes_reply() {
        for text in ["All set.", "Really!", "Anything else?", "done\n\n"] {
            let result = transition(&awaiting("r-1"), fragment(text)).unwrap();
            assert_eq!(result.state, LinkState::Idle, "fragment {text:?}");
            assert!(result.effects.contains(&Effect::AppendFragment {
                reply_id: "r-1".to_string(),
                text: text.to_string(),
            }));
            assert!(result.effects.contains(&Effect::ClearResponding));
        }
    }

    #[test]
    fn oversized_fragment_finishes_reply() {
        let text = "x".repeat(101);
        let result = transition(&awaiting("r-1"), fragment(&text)).unwrap();
        assert_eq!(result.state, LinkState::Idle);
    }

    #[test]
    fn completion_marker_finishes_without_appending() {
        let result = transition(
            &awaiting("r-1"),
            LinkEvent::Frame {
                frame: InboundFrame::Complete,
            },
        )
        .unwrap();
        assert_eq!(result.state, LinkState::Idle);
        assert!(!result
            .effects
            .iter()
            .any(|e| matches!(e, Effect::AppendFragment { .. })));
        assert!(result.effects.contains(&Effect::ClearResponding));
    }

    #[test]
    fn service_error_frame_finishes_without_appending() {
        let result = transition(
            &awaiting("r-1"),
            LinkEvent::Frame {
                frame: InboundFrame::ServiceError("model unavailable".to_string()),
            },
        )
        .unwrap();
        assert_eq!(result.state, LinkState::Idle);
        assert!(!result
            .effects
            .iter()
            .any(|e| matches!(e, Effect::AppendFragment { .. })));
    }

    #[test]
    fn noise_frame_is_dropped() {
        let result = transition(
            &awaiting("r-1"),
            LinkEvent::Frame {
                frame: InboundFrame::Noise,
            },
        )
        .unwrap();
        assert_eq!(result.state, awaiting("r-1"));
        assert!(result.effects.is_empty());
    }

    #[test]
    fn idle_timer_finishes_reply() {
        let result = transition(
            &awaiting("r-1"),
            LinkEvent::IdleElapsed {
                reply_id: "r-1".to_string(),
            },
        )
        .unwrap();
        assert_eq!(result.state, LinkState::Idle);
        assert!(result.effects.contains(&Effect::ClearResponding));
    }

    #[test]
    fn stale_idle_timer_is_ignored() {
        let result = transition(
            &awaiting("r-2"),
            LinkEvent::IdleElapsed {
                reply_id: "r-1".to_string(),
            },
        )
        .unwrap();
        assert_eq!(result.state, awaiting("r-2"));
        assert!(result.effects.is_empty());
    }

    #[test]
    fn ceiling_timer_finishes_reply() {
        let result = transition(
            &awaiting("r-1"),
            LinkEvent::CeilingElapsed {
                reply_id: "r-1".to_string(),
            },
        )
        .unwrap();
        assert_eq!(result.state, LinkState::Idle);
    }

    #[test]
    fn drop_mid_reply_keeps_partial_and_schedules_reconnect() {
        let result = transition(&awaiting("r-1"), LinkEvent::Closed).unwrap();
        assert_eq!(result.state, LinkState::Reconnecting { attempt: 1 });
        // Flags clear and timers die, but nothing rolls the partial
        // message back.
        assert!(result.effects.contains(&Effect::ClearResponding));
        assert!(result.effects.contains(&Effect::CancelReplyTimers));
        assert!(result
            .effects
            .iter()
            .any(|e| matches!(e, Effect::ScheduleReconnect { attempt: 1, .. })));
    }

    #[test]
    fn reconnect_ladder_gives_up_after_max_attempts() {
        let mut state = LinkState::Disconnected;
        let result = transition(&state, LinkEvent::ConnectRequested).unwrap();
        state = result.state;

        for expected_attempt in 1..=MAX_RECONNECT_ATTEMPTS {
            let result = transition(
                &state,
                LinkEvent::OpenFailed {
                    reason: "refused".to_string(),
                },
            )
            .unwrap();
            assert_eq!(
                result.state,
                LinkState::Reconnecting {
                    attempt: expected_attempt
                }
            );
            let result = transition(
                &result.state,
                LinkEvent::ReconnectDue {
                    attempt: expected_attempt,
                },
            )
            .unwrap();
            assert_eq!(
                result.state,
                LinkState::Connecting {
                    attempt: expected_attempt
                }
            );
            state = result.state;
        }

        let result = transition(
            &state,
            LinkEvent::OpenFailed {
                reason: "refused".to_string(),
            },
        )
        .unwrap();
        assert_eq!(result.state, LinkState::GaveUp);
        assert!(result.effects.is_empty());
    }

    #[test]
    fn stale_reconnect_tick_is_ignored() {
        let state = LinkState::Reconnecting { attempt: 3 };
        let result = transition(&state, LinkEvent::ReconnectDue { attempt: 2 }).unwrap();
        assert_eq!(result.state, state);
        assert!(result.effects.is_empty());
    }

    #[test]
    fn disconnect_cancels_everything_and_is_idempotent() {
        let first = transition(&awaiting("r-1"), LinkEvent::DisconnectRequested).unwrap();
        assert_eq!(first.state, LinkState::Disconnected);
        for effect in [
            Effect::CancelReplyTimers,
            Effect::CancelReconnect,
            Effect::CloseLink,
            Effect::ClearResponding,
        ] {
            assert!(first.effects.contains(&effect));
        }

        let second = transition(&first.state, LinkEvent::DisconnectRequested).unwrap();
        assert_eq!(second.state, LinkState::Disconnected);
    }

    #[test]
    fn fixed_reconnect_delay() {
        assert_eq!(reconnect_delay(1), Duration::from_secs(2));
        assert_eq!(reconnect_delay(5), Duration::from_secs(2));
    }
}
