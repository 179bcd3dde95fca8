//! Wire types for the assistant's request/response endpoints

use serde::{Deserialize, Serialize};

/// Role of a turn as the service expects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    System,
    User,
    Assistant,
}

/// One entry in the conversation context sent to the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnMessage {
    pub role: TurnRole,
    pub content: String,
}

impl TurnMessage {
    pub fn new(role: TurnRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Outbound body for the conversation-turn endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct TurnRequest {
    pub user_email: String,
    /// System prompt first, then prior turns in order, then the new user
    /// text last.
    pub messages: Vec<TurnMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl TurnRequest {
    pub fn new(user_email: impl Into<String>, messages: Vec<TurnMessage>) -> Self {
        Self {
            user_email: user_email.into(),
            messages,
            model: None,
            temperature: None,
            max_tokens: None,
        }
    }
}

/// Complete reply for one conversation turn.
#[derive(Debug, Clone, Deserialize)]
pub struct TurnReply {
    #[serde(rename = "message")]
    pub text: String,
    #[allow(dead_code)] // Wire completeness; the UI timestamps locally
    pub timestamp: String,
    #[allow(dead_code)]
    pub conversation_id: String,
}

/// One past exchange from the history endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryTurn {
    pub user_message: String,
    pub assistant_response: String,
    #[allow(dead_code)] // Wire completeness; hydration re-stamps locally
    pub timestamp: String,
    #[allow(dead_code)]
    pub conversation_id: String,
}

/// Envelope the history endpoint wraps its entries in.
#[derive(Debug, Deserialize)]
pub(crate) struct HistoryEnvelope {
    pub conversations: Vec<HistoryTurn>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turn_request_omits_unset_generation_params() {
        let request = TurnRequest::new(
            "student@campus.edu",
            vec![TurnMessage::new(TurnRole::User, "hello")],
        );
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["user_email"], "student@campus.edu");
        assert_eq!(json["messages"][0]["role"], "user");
        assert!(json.get("model").is_none());
        assert!(json.get("temperature").is_none());
        assert!(json.get("max_tokens").is_none());
    }

    #[test]
    fn turn_reply_parses_service_shape() {
        let reply: TurnReply = serde_json::from_str(
            r#"{
                "user_email": "student@campus.edu",
                "message": "Hi there!",
                "timestamp": "2024-05-01T12:00:00Z",
                "conversation_id": "c-42"
            }"#,
        )
        .unwrap();

        assert_eq!(reply.text, "Hi there!");
        assert_eq!(reply.conversation_id, "c-42");
    }

    #[test]
    fn history_envelope_parses_entries_in_order() {
        let envelope: HistoryEnvelope = serde_json::from_str(
            r#"{
                "user_email": "student@campus.edu",
                "conversations": [
                    {
                        "user_message": "first question",
                        "assistant_response": "first answer",
                        "timestamp": "2024-05-01T12:00:00Z",
                        "conversation_id": "c-1"
                    },
                    {
                        "user_message": "second question",
                        "assistant_response": "second answer",
                        "timestamp": "2024-05-01T12:05:00Z",
                        "conversation_id": "c-1"
                    }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(envelope.conversations.len(), 2);
        assert_eq!(envelope.conversations[0].user_message, "first question");
        assert_eq!(envelope.conversations[1].assistant_response, "second answer");
    }
}
