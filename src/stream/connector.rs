//! Duplex link establishment
//!
//! The session runtime only ever sees channel halves, so tests can hand it
//! a scripted fake while production dials a WebSocket.

use super::StreamError;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

/// A live duplex link. Outbound payloads are serialized frames; the inbound
/// half yields raw text payloads, and its closure signals link loss.
pub struct Duplex {
    pub outbound: mpsc::Sender<String>,
    pub inbound: mpsc::Receiver<String>,
}

/// Opens duplex links addressed to a user identity.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Open a link for `identity`. Resolves once the handshake completes.
    async fn open(&self, identity: &str) -> Result<Duplex, StreamError>;
}

#[async_trait]
impl<T: Connector + ?Sized> Connector for Arc<T> {
    async fn open(&self, identity: &str) -> Result<Duplex, StreamError> {
        (**self).open(identity).await
    }
}

/// Production connector over a WebSocket.
pub struct WsConnector {
    base_url: String,
}

impl WsConnector {
    /// `base_url` is the ws(s) service root, e.g. `ws://localhost:8000`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    /// Stream endpoint with the identity as a path segment, so addresses
    /// like emails are percent-encoded for free.
    fn endpoint(&self, identity: &str) -> Result<String, StreamError> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .and_then(|base| base.join("assistant/stream/"))
            .map_err(|e| StreamError::ConnectFailed(format!("invalid stream url: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| {
                StreamError::ConnectFailed("stream url cannot carry path segments".to_string())
            })?
            .push(identity);
        Ok(url.to_string())
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn open(&self, identity: &str) -> Result<Duplex, StreamError> {
        let url = self.endpoint(identity)?;
        let (ws, _) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| StreamError::ConnectFailed(e.to_string()))?;
        tracing::debug!(url = %url, "stream link established");

        let (mut sink, mut stream) = ws.split();
        let (out_tx, mut out_rx) = mpsc::channel::<String>(32);
        let (in_tx, in_rx) = mpsc::channel::<String>(32);

        // One pump owns both halves so outbound frames and ping replies
        // share the sink.
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    outbound = out_rx.recv() => match outbound {
                        Some(text) => {
                            if let Err(e) = sink.send(Message::Text(text)).await {
                                tracing::warn!(error = %e, "stream write failed");
                                break;
                            }
                        }
                        None => {
                            let _ = sink.close().await;
                            break;
                        }
                    },
                    message = stream.next() => match message {
                        Some(Ok(Message::Text(text))) => {
                            if in_tx.send(text).await.is_err() {
                                break;
                            }
                        }
                        Some(Ok(Message::Ping(payload))) => {
                            let _ = sink.send(Message::Pong(payload)).await;
                        }
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            tracing::warn!(error = %e, "stream read failed");
                            break;
                        }
                    },
                }
            }
            // Dropping in_tx closes the inbound half, which the session
            // observes as link loss.
        });

        Ok(Duplex {
            outbound: out_tx,
            inbound: in_rx,
        })
    }
}
