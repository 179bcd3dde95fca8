//! Property-based tests for the link state machine
//!
//! These check the invariants that matter across all inputs: replies are
//! assembled strictly in arrival order, control payloads never leak into
//! reply text, sends are only accepted when the link is idle, and
//! disconnect always lands in `Disconnected`.

use super::*;
use proptest::prelude::*;

fn arb_reply_id() -> impl Strategy<Value = String> {
    "[a-z0-9]{8}".prop_map(|s| format!("reply-{s}"))
}

/// Fragment text that never trips the completion heuristic: no
/// sentence-final punctuation, well under the length threshold.
fn arb_quiet_fragment() -> impl Strategy<Value = String> {
    "[a-z]{1,40}"
}

fn arb_state() -> impl Strategy<Value = LinkState> {
    prop_oneof![
        Just(LinkState::Disconnected),
        (0u32..=MAX_RECONNECT_ATTEMPTS).prop_map(|attempt| LinkState::Connecting { attempt }),
        Just(LinkState::Idle),
        arb_reply_id().prop_map(|reply_id| LinkState::AwaitingReply { reply_id }),
        (1u32..=MAX_RECONNECT_ATTEMPTS).prop_map(|attempt| LinkState::Reconnecting { attempt }),
        Just(LinkState::GaveUp),
    ]
}

fn arb_frame() -> impl Strategy<Value = InboundFrame> {
    prop_oneof![
        arb_quiet_fragment().prop_map(InboundFrame::Fragment),
        Just(InboundFrame::Complete),
        "[a-z ]{1,30}".prop_map(InboundFrame::ServiceError),
        Just(InboundFrame::Noise),
    ]
}

fn arb_event() -> impl Strategy<Value = LinkEvent> {
    prop_oneof![
        Just(LinkEvent::ConnectRequested),
        (arb_reply_id(), arb_quiet_fragment()).prop_map(|(reply_id, text)| {
            LinkEvent::SendRequested {
                reply_id,
                text,
                system: None,
            }
        }),
        Just(LinkEvent::DisconnectRequested),
        Just(LinkEvent::Opened),
        "[a-z ]{1,20}".prop_map(|reason| LinkEvent::OpenFailed { reason }),
        arb_frame().prop_map(|frame| LinkEvent::Frame { frame }),
        Just(LinkEvent::Closed),
        arb_reply_id().prop_map(|reply_id| LinkEvent::IdleElapsed { reply_id }),
        arb_reply_id().prop_map(|reply_id| LinkEvent::CeilingElapsed { reply_id }),
        (0u32..10).prop_map(|attempt| LinkEvent::ReconnectDue { attempt }),
    ]
}

/// Collect the fragment text a transition appends, if any.
fn appended_text(effects: &[Effect]) -> Option<(String, String)> {
    effects.iter().find_map(|effect| match effect {
        Effect::AppendFragment { reply_id, text } => Some((reply_id.clone(), text.clone())),
        _ => None,
    })
}

proptest! {
    /// The reply body equals the concatenation of non-control fragments in
    /// arrival order; control payloads contribute nothing.
    #[test]
    fn reply_assembles_fragments_in_order(
        reply_id in arb_reply_id(),
        fragments in proptest::collection::vec(arb_quiet_fragment(), 0..12),
    ) {
        let mut state = LinkState::AwaitingReply { reply_id: reply_id.clone() };
        let mut body = String::new();

        for fragment in &fragments {
            let result = transition(
                &state,
                LinkEvent::Frame { frame: InboundFrame::Fragment(fragment.clone()) },
            ).unwrap();
            if let Some((target, text)) = appended_text(&result.effects) {
                prop_assert_eq!(&target, &reply_id);
                body.push_str(&text);
            }
            state = result.state;
            prop_assert_eq!(&state, &LinkState::AwaitingReply { reply_id: reply_id.clone() });
        }

        prop_assert_eq!(&body, &fragments.concat());

        let result = transition(
            &state,
            LinkEvent::Frame { frame: InboundFrame::Complete },
        ).unwrap();
        prop_assert_eq!(result.state, LinkState::Idle);
        prop_assert!(appended_text(&result.effects).is_none());
    }

    /// Control payloads never append text, from any state.
    #[test]
    fn control_frames_never_append(state in arb_state(), error in "[a-z ]{1,30}") {
        for frame in [
            InboundFrame::Complete,
            InboundFrame::ServiceError(error.clone()),
            InboundFrame::Noise,
        ] {
            let result = transition(&state, LinkEvent::Frame { frame }).unwrap();
            prop_assert!(appended_text(&result.effects).is_none());
        }
    }

    /// Sends are accepted exactly in the connected-idle state.
    #[test]
    fn send_accepted_only_when_idle(state in arb_state(), reply_id in arb_reply_id()) {
        let result = transition(
            &state,
            LinkEvent::SendRequested {
                reply_id,
                text: "question".to_string(),
                system: None,
            },
        );
        match &state {
            LinkState::Idle => prop_assert!(result.is_ok()),
            LinkState::AwaitingReply { .. } => {
                prop_assert_eq!(result.unwrap_err(), StreamError::ReplyOutstanding);
            }
            _ => prop_assert_eq!(result.unwrap_err(), StreamError::NotConnected),
        }
    }

    /// Disconnect lands in `Disconnected` from every state, cancelling
    /// timers and clearing the responding flags.
    #[test]
    fn disconnect_always_lands_disconnected(state in arb_state()) {
        let result = transition(&state, LinkEvent::DisconnectRequested).unwrap();
        prop_assert_eq!(result.state, LinkState::Disconnected);
        prop_assert!(result.effects.contains(&Effect::CancelReplyTimers));
        prop_assert!(result.effects.contains(&Effect::CancelReconnect));
        prop_assert!(result.effects.contains(&Effect::ClearResponding));
    }

    /// The transition function is total: no state/event pair panics, and a
    /// rejection can only come from a send.
    #[test]
    fn transition_is_total(state in arb_state(), event in arb_event()) {
        let is_send = matches!(event, LinkEvent::SendRequested { .. });
        match transition(&state, event) {
            Ok(_) => {}
            Err(_) => prop_assert!(is_send),
        }
    }

    /// The reconnect ladder is bounded: a failed handshake either schedules
    /// the next attempt (staying within the ceiling) or gives up.
    #[test]
    fn reconnect_ladder_is_bounded(attempt in 0u32..=MAX_RECONNECT_ATTEMPTS) {
        let result = transition(
            &LinkState::Connecting { attempt },
            LinkEvent::OpenFailed { reason: "refused".to_string() },
        ).unwrap();

        if attempt >= MAX_RECONNECT_ATTEMPTS {
            prop_assert_eq!(result.state, LinkState::GaveUp);
        } else {
            prop_assert_eq!(
                result.state,
                LinkState::Reconnecting { attempt: attempt + 1 }
            );
            let schedules_reconnect = result
                .effects
                .iter()
                .any(|e| matches!(e, Effect::ScheduleReconnect { .. }));
            prop_assert!(schedules_reconnect);
        }
    }
}
