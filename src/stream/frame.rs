//! Inbound frame classification and the outbound frame shape
//!
//! The service does not distinguish control payloads from reply text at the
//! protocol level; everything arrives as text. Classification probes each
//! payload for the JSON control shapes before treating it as a fragment.

use serde::Serialize;

/// Outbound frame for the duplex link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundFrame {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
}

/// Classification of one inbound payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    /// Incremental reply text, appended verbatim (whitespace preserved —
    /// the presentation layer may parse formatting markers out of it).
    Fragment(String),

    /// Explicit completion marker.
    Complete,

    /// Embedded service error; ends the reply without appending.
    ServiceError(String),

    /// Housekeeping payloads that never reach the conversation.
    Noise,
}

impl InboundFrame {
    /// Classify a raw text payload.
    pub fn classify(raw: &str) -> Self {
        if raw.is_empty() {
            return InboundFrame::Noise;
        }
        // Service notices emitted while replaying an empty history.
        if raw.contains("no chat history") || raw.contains("No history found") {
            return InboundFrame::Noise;
        }

        if let Ok(value) = serde_json::from_str::<serde_json::Value>(raw) {
            if let Some(error) = value.get("error").and_then(|e| e.as_str()) {
                return InboundFrame::ServiceError(error.to_string());
            }
            if value.get("status").and_then(|s| s.as_str()) == Some("complete")
                || value.get("complete").and_then(serde_json::Value::as_bool) == Some(true)
            {
                return InboundFrame::Complete;
            }
            if let Some(text) = value.get("message").and_then(|m| m.as_str()) {
                return InboundFrame::Fragment(text.to_string());
            }
            // JSON-parseable but not a known control shape: the payload is
            // reply text that happens to parse (numbers, quoted strings).
        }

        InboundFrame::Fragment(raw.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_a_fragment() {
        assert_eq!(
            InboundFrame::classify("There are"),
            InboundFrame::Fragment("There are".to_string())
        );
    }

    #[test]
    fn whitespace_fragment_survives_verbatim() {
        assert_eq!(
            InboundFrame::classify("  \n"),
            InboundFrame::Fragment("  \n".to_string())
        );
    }

    #[test]
    fn empty_payload_is_noise() {
        assert_eq!(InboundFrame::classify(""), InboundFrame::Noise);
    }

    #[test]
    fn history_notices_are_noise() {
        assert_eq!(
            InboundFrame::classify("no chat history for user"),
            InboundFrame::Noise
        );
        assert_eq!(
            InboundFrame::classify("No history found"),
            InboundFrame::Noise
        );
    }

    #[test]
    fn error_object_is_intercepted() {
        assert_eq!(
            InboundFrame::classify(r#"{"error": "model unavailable"}"#),
            InboundFrame::ServiceError("model unavailable".to_string())
        );
    }

    #[test]
    fn completion_marker_variants() {
        assert_eq!(
            InboundFrame::classify(r#"{"status": "complete"}"#),
            InboundFrame::Complete
        );
        assert_eq!(
            InboundFrame::classify(r#"{"complete": true}"#),
            InboundFrame::Complete
        );
        // complete: false is not a completion marker, and not a known
        // control shape either, so the raw payload passes through.
        assert_eq!(
            InboundFrame::classify(r#"{"complete": false}"#),
            InboundFrame::Fragment(r#"{"complete": false}"#.to_string())
        );
    }

    #[test]
    fn embedded_message_field_is_unwrapped() {
        assert_eq!(
            InboundFrame::classify(r#"{"message": "wrapped text"}"#),
            InboundFrame::Fragment("wrapped text".to_string())
        );
    }

    #[test]
    fn json_parseable_reply_text_passes_through() {
        assert_eq!(
            InboundFrame::classify("42"),
            InboundFrame::Fragment("42".to_string())
        );
    }

    #[test]
    fn outbound_frame_omits_absent_system() {
        let frame = OutboundFrame {
            message: "events today?".to_string(),
            system: None,
        };
        assert_eq!(
            serde_json::to_string(&frame).unwrap(),
            r#"{"message":"events today?"}"#
        );

        let frame = OutboundFrame {
            message: "events today?".to_string(),
            system: Some("You are CampusAI.".to_string()),
        };
        assert_eq!(
            serde_json::to_string(&frame).unwrap(),
            r#"{"message":"events today?","system":"You are CampusAI."}"#
        );
    }
}
