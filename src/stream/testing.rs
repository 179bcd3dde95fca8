//! Test doubles for the streaming transport
//!
//! These fakes let the session runtime be exercised without a network: the
//! connector hands out channel-backed links the test can read from, inject
//! into, or sever.

use super::{Connector, Duplex, StreamError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::mpsc;

/// Scripted outcome for one `open()` call.
pub enum OpenOutcome {
    Accept,
    Refuse(String),
}

/// A link the test drives: read what the client transmitted, inject inbound
/// payloads, or drop the whole handle to sever the link.
pub struct FakeLink {
    pub transmitted: mpsc::Receiver<String>,
    pub inject: mpsc::Sender<String>,
}

/// Connector whose `open()` consumes scripted outcomes; with nothing
/// scripted it accepts.
#[derive(Default)]
pub struct FakeConnector {
    script: Mutex<VecDeque<OpenOutcome>>,
    links: Mutex<VecDeque<FakeLink>>,
    opens: Mutex<u32>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an outcome for the next unscripted `open()`.
    pub fn push(&self, outcome: OpenOutcome) {
        self.script.lock().unwrap().push_back(outcome);
    }

    /// Queue `count` refusals.
    pub fn refuse_next(&self, count: usize) {
        for _ in 0..count {
            self.push(OpenOutcome::Refuse("connection refused".to_string()));
        }
    }

    /// Take the handle for the oldest opened link not yet claimed.
    pub fn take_link(&self) -> FakeLink {
        self.links
            .lock()
            .unwrap()
            .pop_front()
            .expect("no link has been opened")
    }

    /// How many times `open()` was called.
    pub fn open_count(&self) -> u32 {
        *self.opens.lock().unwrap()
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn open(&self, _identity: &str) -> Result<Duplex, StreamError> {
        *self.opens.lock().unwrap() += 1;
        let outcome = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(OpenOutcome::Accept);
        match outcome {
            OpenOutcome::Refuse(reason) => Err(StreamError::ConnectFailed(reason)),
            OpenOutcome::Accept => {
                let (out_tx, out_rx) = mpsc::channel(32);
                let (in_tx, in_rx) = mpsc::channel(32);
                self.links.lock().unwrap().push_back(FakeLink {
                    transmitted: out_rx,
                    inject: in_tx,
                });
                Ok(Duplex {
                    outbound: out_tx,
                    inbound: in_rx,
                })
            }
        }
    }
}
