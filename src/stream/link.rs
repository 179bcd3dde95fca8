//! Streaming session runtime
//!
//! One task owns the whole connection session: the state machine, the link
//! halves, and the idle/ceiling/reconnect timers. Commands and link events
//! are processed one at a time, so every transition is atomic with respect
//! to the others. Timers are spawned sleeps that post events back; each is
//! guarded by a cancellation token owned here and by staleness checks in
//! the transition function.

use super::frame::{InboundFrame, OutboundFrame};
use super::transition::{transition, IDLE_COMPLETION_WINDOW, RESPONSE_CEILING, TransitionResult};
use super::{Connector, Duplex, Effect, LinkEvent, LinkState, StreamError};
use crate::identity::IdentitySource;
use crate::store::ConversationStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// Tunables for the streaming session.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Fragment silence after which a reply is considered finished.
    pub idle_completion: Duration,
    /// Hard bound on how long a reply may stay outstanding.
    pub response_ceiling: Duration,
    /// Handshake timeout.
    pub connect_timeout: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            idle_completion: IDLE_COMPLETION_WINDOW,
            response_ceiling: RESPONSE_CEILING,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

enum Command {
    Connect {
        done: oneshot::Sender<Result<LinkState, StreamError>>,
    },
    Send {
        text: String,
        system: Option<String>,
        done: oneshot::Sender<Result<String, StreamError>>,
    },
    Disconnect {
        done: oneshot::Sender<()>,
    },
    Inspect {
        done: oneshot::Sender<LinkState>,
    },
}

/// Traffic and timer notifications delivered to the session task.
enum SessionEvent {
    /// Raw payload from the link pump, tagged with the link generation so a
    /// stale pump cannot poison a newer link.
    Raw { generation: u64, text: String },
    /// The pump's inbound half closed.
    RawClosed { generation: u64 },
    /// A timer fired.
    Timer(LinkEvent),
}

/// Handle to the per-user streaming session. Cloneable; all clones talk to
/// the same session task.
#[derive(Clone)]
pub struct StreamingChat {
    commands: mpsc::Sender<Command>,
}

impl StreamingChat {
    /// Spawn the session task. Store, connector, and identity source are
    /// injected here; the session never reaches for globals.
    pub fn spawn<C: Connector>(
        connector: C,
        identity: Arc<dyn IdentitySource>,
        store: Arc<ConversationStore>,
        config: StreamConfig,
    ) -> Self {
        let (commands, command_rx) = mpsc::channel(32);
        let (events, event_rx) = mpsc::channel(64);
        let session = LinkSession {
            connector,
            identity,
            store,
            config,
            state: LinkState::default(),
            link: None,
            generation: 0,
            events,
            idle_timer: None,
            ceiling_timer: None,
            reconnect_timer: None,
        };
        tokio::spawn(session.run(command_rx, event_rx));
        Self { commands }
    }

    /// Open the link. Requires a resolved identity. A no-op reporting the
    /// existing state when the session is already connecting or connected.
    pub async fn connect(&self) -> Result<LinkState, StreamError> {
        let (done, ack) = oneshot::channel();
        self.commands
            .send(Command::Connect { done })
            .await
            .map_err(|_| StreamError::Terminated)?;
        ack.await.map_err(|_| StreamError::Terminated)?
    }

    /// Send one user message. Returns the minted reply identifier as soon
    /// as the frame is handed to the link; the reply itself is observed
    /// through the conversation store.
    pub async fn send(&self, text: &str, system: Option<&str>) -> Result<String, StreamError> {
        if text.trim().is_empty() {
            return Err(StreamError::EmptyMessage);
        }
        let (done, ack) = oneshot::channel();
        self.commands
            .send(Command::Send {
                text: text.to_string(),
                system: system.map(String::from),
                done,
            })
            .await
            .map_err(|_| StreamError::Terminated)?;
        ack.await.map_err(|_| StreamError::Terminated)?
    }

    /// Tear down the session: cancels every timer, abandons any outstanding
    /// reply, clears the responding flags. Safe to call repeatedly.
    pub async fn disconnect(&self) {
        let (done, ack) = oneshot::channel();
        if self
            .commands
            .send(Command::Disconnect { done })
            .await
            .is_ok()
        {
            let _ = ack.await;
        }
    }

    /// Current link state.
    pub async fn state(&self) -> LinkState {
        let (done, ack) = oneshot::channel();
        if self.commands.send(Command::Inspect { done }).await.is_ok() {
            if let Ok(state) = ack.await {
                return state;
            }
        }
        LinkState::Disconnected
    }
}

struct LinkSession<C: Connector> {
    connector: C,
    identity: Arc<dyn IdentitySource>,
    store: Arc<ConversationStore>,
    config: StreamConfig,
    state: LinkState,
    /// Outbound half of the current link.
    link: Option<mpsc::Sender<String>>,
    /// Bumped whenever a link is opened or dropped; events from older
    /// generations are discarded.
    generation: u64,
    events: mpsc::Sender<SessionEvent>,
    idle_timer: Option<CancellationToken>,
    ceiling_timer: Option<CancellationToken>,
    reconnect_timer: Option<CancellationToken>,
}

impl<C: Connector> LinkSession<C> {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut events: mpsc::Receiver<SessionEvent>,
    ) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    // Every handle dropped: tear down and stop.
                    None => {
                        let _ = self.apply(LinkEvent::DisconnectRequested).await;
                        break;
                    }
                },
                Some(event) = events.recv() => self.handle_session_event(event).await,
            }
        }
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect { done } => {
                if self.identity.identity().is_none() {
                    let _ = done.send(Err(StreamError::NotAuthenticated));
                    return;
                }
                let result = self.apply(LinkEvent::ConnectRequested).await;
                let _ = done.send(result.map(|()| self.state.clone()));
            }
            Command::Send { text, system, done } => {
                let reply_id = uuid::Uuid::new_v4().to_string();
                let result = self
                    .apply(LinkEvent::SendRequested {
                        reply_id: reply_id.clone(),
                        text,
                        system,
                    })
                    .await
                    .and_then(|()| {
                        // The transmit itself may have discovered a dead
                        // link; only acknowledge if the reply is still
                        // outstanding.
                        if self.state.outstanding_reply() == Some(reply_id.as_str()) {
                            Ok(reply_id)
                        } else {
                            Err(StreamError::NotConnected)
                        }
                    });
                let _ = done.send(result);
            }
            Command::Disconnect { done } => {
                let _ = self.apply(LinkEvent::DisconnectRequested).await;
                let _ = done.send(());
            }
            Command::Inspect { done } => {
                let _ = done.send(self.state.clone());
            }
        }
    }

    async fn handle_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Raw { generation, text } => {
                if generation != self.generation {
                    return;
                }
                let frame = InboundFrame::classify(&text);
                if let InboundFrame::ServiceError(message) = &frame {
                    tracing::warn!(%message, "assistant stream reported an error");
                }
                let _ = self.apply(LinkEvent::Frame { frame }).await;
            }
            SessionEvent::RawClosed { generation } => {
                if generation != self.generation {
                    return;
                }
                let _ = self.apply(LinkEvent::Closed).await;
            }
            SessionEvent::Timer(event) => {
                let _ = self.apply(event).await;
            }
        }
    }

    /// Run one event through the transition function and execute its
    /// effects. Effect execution may surface follow-up events (handshake
    /// results, dead-link discovery); those are processed before returning.
    async fn apply(&mut self, event: LinkEvent) -> Result<(), StreamError> {
        let result = transition(&self.state, event)?;
        let mut follow_ups = self.commit(result).await;
        while let Some(event) = follow_ups.pop() {
            match transition(&self.state, event) {
                Ok(result) => follow_ups.extend(self.commit(result).await),
                Err(error) => tracing::warn!(%error, "follow-up event rejected"),
            }
        }
        Ok(())
    }

    async fn commit(&mut self, result: TransitionResult) -> Vec<LinkEvent> {
        if self.state != result.state {
            tracing::debug!(from = ?self.state, to = ?result.state, "link state change");
        }
        self.state = result.state;

        let mut follow_ups = Vec::new();
        for effect in result.effects {
            if let Some(event) = self.execute(effect).await {
                follow_ups.push(event);
            }
        }
        follow_ups
    }

    async fn execute(&mut self, effect: Effect) -> Option<LinkEvent> {
        match effect {
            Effect::OpenLink => Some(self.open_link().await),

            Effect::Transmit { frame } => self.transmit(frame).await,

            Effect::CloseLink => {
                // Dropping the outbound half ends the pump; bumping the
                // generation orphans anything it still emits.
                self.generation += 1;
                self.link = None;
                None
            }

            Effect::AppendFragment { reply_id, text } => {
                self.store.append_assistant_fragment(&reply_id, &text);
                None
            }

            Effect::ClearResponding => {
                self.store.set_response_in_flight(false);
                self.store.set_streaming_active(false);
                None
            }

            Effect::ArmIdleTimer { reply_id } => {
                let delay = self.config.idle_completion;
                Self::arm(
                    &mut self.idle_timer,
                    &self.events,
                    delay,
                    LinkEvent::IdleElapsed { reply_id },
                );
                None
            }

            Effect::ArmCeilingTimer { reply_id } => {
                let delay = self.config.response_ceiling;
                Self::arm(
                    &mut self.ceiling_timer,
                    &self.events,
                    delay,
                    LinkEvent::CeilingElapsed { reply_id },
                );
                None
            }

            Effect::CancelReplyTimers => {
                Self::cancel(&mut self.idle_timer);
                Self::cancel(&mut self.ceiling_timer);
                None
            }

            Effect::ScheduleReconnect { attempt, delay } => {
                tracing::info!(attempt, ?delay, "scheduling reconnect");
                Self::arm(
                    &mut self.reconnect_timer,
                    &self.events,
                    delay,
                    LinkEvent::ReconnectDue { attempt },
                );
                None
            }

            Effect::CancelReconnect => {
                Self::cancel(&mut self.reconnect_timer);
                None
            }
        }
    }

    async fn open_link(&mut self) -> LinkEvent {
        let Some(identity) = self.identity.identity() else {
            // Signed out between scheduling and firing a reconnect.
            return LinkEvent::OpenFailed {
                reason: "no authenticated identity".to_string(),
            };
        };

        match tokio::time::timeout(self.config.connect_timeout, self.connector.open(&identity))
            .await
        {
            Ok(Ok(Duplex { outbound, inbound })) => {
                self.generation += 1;
                self.link = Some(outbound);
                self.spawn_pump(inbound);
                LinkEvent::Opened
            }
            Ok(Err(error)) => {
                tracing::warn!(%error, "stream connect failed");
                LinkEvent::OpenFailed {
                    reason: error.to_string(),
                }
            }
            Err(_) => {
                tracing::warn!("stream handshake timed out");
                LinkEvent::OpenFailed {
                    reason: "handshake timed out".to_string(),
                }
            }
        }
    }

    /// Forward inbound payloads into the session's event stream, tagged
    /// with the current link generation.
    fn spawn_pump(&self, mut inbound: mpsc::Receiver<String>) {
        let events = self.events.clone();
        let generation = self.generation;
        tokio::spawn(async move {
            while let Some(text) = inbound.recv().await {
                if events
                    .send(SessionEvent::Raw { generation, text })
                    .await
                    .is_err()
                {
                    return;
                }
            }
            let _ = events.send(SessionEvent::RawClosed { generation }).await;
        });
    }

    async fn transmit(&mut self, frame: OutboundFrame) -> Option<LinkEvent> {
        let payload = match serde_json::to_string(&frame) {
            Ok(payload) => payload,
            Err(error) => {
                tracing::error!(%error, "failed to encode outbound frame");
                return None;
            }
        };
        let Some(link) = &self.link else {
            return Some(LinkEvent::Closed);
        };
        if link.send(payload).await.is_err() {
            tracing::warn!("link rejected outbound frame");
            return Some(LinkEvent::Closed);
        }
        None
    }

    fn arm(
        slot: &mut Option<CancellationToken>,
        events: &mpsc::Sender<SessionEvent>,
        delay: Duration,
        event: LinkEvent,
    ) {
        Self::cancel(slot);
        let token = CancellationToken::new();
        *slot = Some(token.clone());
        let events = events.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => {}
                () = tokio::time::sleep(delay) => {
                    let _ = events.send(SessionEvent::Timer(event)).await;
                }
            }
        });
    }

    fn cancel(slot: &mut Option<CancellationToken>) {
        if let Some(token) = slot.take() {
            token.cancel();
        }
    }
}
