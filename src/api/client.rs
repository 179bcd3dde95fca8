//! Reqwest implementation of the assistant backend

use super::types::HistoryEnvelope;
use super::{ApiError, AssistantBackend, HistoryTurn, TurnReply, TurnRequest};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use std::time::Duration;

/// HTTP client for the assistant service.
pub struct AssistantApi {
    client: Client,
    base_url: Url,
}

impl AssistantApi {
    /// `base_url` is the service root, e.g. `http://localhost:8000`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ApiError::network(format!("invalid base url {base_url}: {e}")))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");
        Ok(Self { client, base_url })
    }

    fn turn_endpoint(&self) -> Result<Url, ApiError> {
        self.base_url
            .join("assistant/chat")
            .map_err(|e| ApiError::network(format!("bad endpoint: {e}")))
    }

    /// History endpoint with the identity as a path segment, so addresses
    /// like emails are percent-encoded for free.
    fn history_endpoint(&self, identity: &str, limit: usize) -> Result<Url, ApiError> {
        let mut url = self
            .base_url
            .join("assistant/history/")
            .map_err(|e| ApiError::network(format!("bad endpoint: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| ApiError::network("base url cannot carry path segments"))?
            .push(identity);
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string());
        Ok(url)
    }

    fn classify_transport(e: &reqwest::Error) -> ApiError {
        if e.is_timeout() {
            ApiError::network(format!("request timeout: {e}"))
        } else if e.is_connect() {
            ApiError::network(format!("connection failed: {e}"))
        } else {
            ApiError::network(format!("request failed: {e}"))
        }
    }

    fn classify_status(status: StatusCode, body: &str, history: bool) -> ApiError {
        // FastAPI-style services put their message under "detail".
        let detail = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(String::from))
            .unwrap_or_else(|| body.to_string());

        if history && status == StatusCode::NOT_FOUND {
            return ApiError::not_found(detail);
        }
        ApiError::service(format!("HTTP {status}: {detail}"))
    }
}

#[async_trait]
impl AssistantBackend for AssistantApi {
    async fn send_turn(&self, request: &TurnRequest) -> Result<TurnReply, ApiError> {
        let url = self.turn_endpoint()?;
        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|e| Self::classify_transport(&e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::network(format!("failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(Self::classify_status(status, &body, false));
        }

        serde_json::from_str(&body)
            .map_err(|e| ApiError::service(format!("failed to parse reply: {e}")))
    }

    async fn fetch_history(
        &self,
        identity: &str,
        limit: usize,
    ) -> Result<Vec<HistoryTurn>, ApiError> {
        let url = self.history_endpoint(identity, limit)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Self::classify_transport(&e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::network(format!("failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(Self::classify_status(status, &body, true));
        }

        let envelope: HistoryEnvelope = serde_json::from_str(&body)
            .map_err(|e| ApiError::service(format!("failed to parse history: {e}")))?;

        tracing::debug!(turns = envelope.conversations.len(), "fetched chat history");
        Ok(envelope.conversations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiErrorKind;

    fn api() -> AssistantApi {
        AssistantApi::new("http://localhost:8000", Duration::from_secs(10)).unwrap()
    }

    #[test]
    fn history_endpoint_encodes_identity() {
        let url = api().history_endpoint("student@campus.edu", 20).unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8000/assistant/history/student%40campus.edu?limit=20"
        );
    }

    #[test]
    fn history_404_classifies_as_not_found() {
        let err = AssistantApi::classify_status(
            StatusCode::NOT_FOUND,
            r#"{"detail": "no chat history found"}"#,
            true,
        );
        assert_eq!(err.kind, ApiErrorKind::NotFound);
        assert_eq!(err.message, "no chat history found");
    }

    #[test]
    fn turn_404_is_a_service_error() {
        // Only the history endpoint gets the not-found treatment.
        let err = AssistantApi::classify_status(StatusCode::NOT_FOUND, "missing", false);
        assert_eq!(err.kind, ApiErrorKind::Service);
    }

    #[test]
    fn server_error_carries_detail() {
        let err = AssistantApi::classify_status(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"detail": "model overloaded"}"#,
            false,
        );
        assert_eq!(err.kind, ApiErrorKind::Service);
        assert!(err.message.contains("model overloaded"));
    }

    #[test]
    fn plain_body_is_kept_when_detail_missing() {
        let err = AssistantApi::classify_status(StatusCode::BAD_GATEWAY, "upstream down", false);
        assert!(err.message.contains("upstream down"));
    }
}
