//! Auto-reconnecting connection to one agent.
//!
//! The manager owns at most one session task. A session loops forever:
//!
//! ```text
//! Connecting --ok--> Connected --close/error--> Disconnected(retry_pending)
//!     |                                              |
//!     +--fail/timeout--> Disconnected(retry_pending) +--retry_delay--> Connecting
//! ```
//!
//! The pending retry is the session's own sleep, so there is never more than
//! one timer per manager. `connect` to a new target, `reconnect` and
//! `disconnect` abort the running session and bump the snapshot generation
//! inside the same watch-channel update. A session only writes state while
//! its generation is current, so an aborted session can neither resurrect a
//! stale connection nor report its telemetry against the new target.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::runtime::Handle;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, trace, warn};

use super::transport::{Connector, Link};
use super::types::{
    ConnectionOptions, ConnectionSnapshot, ConnectionState, InboundMessage, OutboundCommand,
    Target, Telemetry,
};

struct Session {
    target: Target,
    outbound: mpsc::UnboundedSender<OutboundCommand>,
    task: JoinHandle<()>,
}

/// Persistent, self-healing connection to a single agent endpoint.
pub struct ConnectionManager<C: Connector> {
    connector: Arc<C>,
    runtime: Handle,
    options: ConnectionOptions,
    state: Arc<watch::Sender<ConnectionSnapshot>>,
    session: Option<Session>,
}

impl<C: Connector> ConnectionManager<C> {
    /// Create an idle manager. Sessions are spawned on `runtime`.
    pub fn new(connector: C, runtime: Handle, options: ConnectionOptions) -> Self {
        let (state, _) = watch::channel(ConnectionSnapshot::default());
        Self {
            connector: Arc::new(connector),
            runtime,
            options,
            state: Arc::new(state),
            session: None,
        }
    }

    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    /// Current state, telemetry and target as one consistent value.
    #[must_use]
    pub fn snapshot(&self) -> ConnectionSnapshot {
        self.state.borrow().clone()
    }

    /// Observe every snapshot change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ConnectionSnapshot> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state.borrow().is_connected()
    }

    #[must_use]
    pub fn telemetry(&self) -> Option<Telemetry> {
        self.state.borrow().telemetry
    }

    #[must_use]
    pub fn target(&self) -> Option<Target> {
        self.session.as_ref().map(|s| s.target.clone())
    }

    /// Start connecting to `target`.
    ///
    /// If a live session already targets the same endpoint this is a no-op.
    /// Otherwise any existing session is torn down first, including its
    /// pending retry.
    #[instrument(skip(self), fields(target = %target))]
    pub fn connect(&mut self, target: Target) {
        if let Some(session) = &self.session {
            if session.target == target && !session.task.is_finished() {
                debug!("Already targeting endpoint, ignoring connect");
                return;
            }
        }
        self.start(target);
    }

    /// Cancel any pending retry and start a fresh attempt against the
    /// current target, whatever the current state.
    #[instrument(skip(self))]
    pub fn reconnect(&mut self) {
        match self.target() {
            Some(target) => {
                info!(target = %target, "Manual reconnect");
                self.start(target);
            }
            None => warn!("Reconnect requested with no target"),
        }
    }

    /// Close the transport and cancel any pending retry.
    #[instrument(skip(self))]
    pub fn disconnect(&mut self) {
        let had_session = self.stop_session();
        self.bump(|snap| {
            snap.state = ConnectionState::Disconnected;
            snap.retry_pending = false;
            snap.target = None;
            snap.telemetry = None;
        });
        if had_session {
            info!("Disconnected");
        }
    }

    /// Flush queued commands, close the transport and stop the session,
    /// waiting at most `timeout` before aborting it.
    #[instrument(skip(self))]
    pub async fn shutdown(&mut self, timeout: Duration) {
        if let Some(Session {
            target,
            outbound,
            mut task,
        }) = self.session.take()
        {
            drop(outbound);
            if tokio::time::timeout(timeout, &mut task).await.is_err() {
                debug!(target = %target, "Session did not stop in time, aborting");
                task.abort();
            }
        }
        self.bump(|snap| {
            snap.state = ConnectionState::Disconnected;
            snap.retry_pending = false;
            snap.target = None;
            snap.telemetry = None;
        });
    }

    /// Fire-and-forget send.
    ///
    /// Returns false (and logs) when not connected. Nothing is buffered for
    /// later delivery: commands that miss the live link are dropped.
    pub fn send(&self, command: OutboundCommand) -> bool {
        if !self.is_connected() {
            warn!(action = %command.action, "Not connected, dropping command");
            return false;
        }
        let Some(session) = &self.session else {
            warn!(action = %command.action, "No session, dropping command");
            return false;
        };
        trace!(action = %command.action, params = ?command.params, "Queueing command");
        if session.outbound.send(command).is_err() {
            warn!("Session ended, command dropped");
            return false;
        }
        true
    }

    /// Wait until the connection reaches `Connected`, up to `timeout`.
    pub async fn wait_connected(&self, timeout: Duration) -> bool {
        let mut rx = self.subscribe();
        matches!(
            tokio::time::timeout(timeout, rx.wait_for(ConnectionSnapshot::is_connected)).await,
            Ok(Ok(_))
        )
    }

    fn start(&mut self, target: Target) {
        self.stop_session();
        let generation = self.bump(|snap| {
            snap.state = ConnectionState::Connecting;
            snap.retry_pending = false;
            snap.target = Some(target.clone());
            snap.telemetry = None;
        });
        debug!(target = %target, generation, "Starting session");

        let (outbound, rx) = mpsc::unbounded_channel();
        let worker = SessionWorker {
            connector: Arc::clone(&self.connector),
            state: Arc::clone(&self.state),
            options: self.options.clone(),
            target: target.clone(),
            generation,
        };
        let task = self.runtime.spawn(worker.run(rx));
        self.session = Some(Session {
            target,
            outbound,
            task,
        });
    }

    fn stop_session(&mut self) -> bool {
        match self.session.take() {
            Some(session) => {
                trace!(target = %session.target, "Aborting session");
                session.task.abort();
                true
            }
            None => false,
        }
    }

    fn bump(&self, f: impl FnOnce(&mut ConnectionSnapshot)) -> u64 {
        let mut generation = 0;
        self.state.send_modify(|snap| {
            snap.generation += 1;
            generation = snap.generation;
            f(snap);
        });
        generation
    }
}

impl<C: Connector> Drop for ConnectionManager<C> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[derive(Debug, PartialEq, Eq)]
enum PumpExit {
    /// The remote closed or the transport failed.
    Remote,
    /// The manager dropped the command channel.
    Shutdown,
}

struct SessionWorker<C: Connector> {
    connector: Arc<C>,
    state: Arc<watch::Sender<ConnectionSnapshot>>,
    options: ConnectionOptions,
    target: Target,
    generation: u64,
}

impl<C: Connector> SessionWorker<C> {
    /// Apply `f` only if this session is still current.
    fn update(&self, f: impl FnOnce(&mut ConnectionSnapshot)) -> bool {
        self.state.send_if_modified(|snap| {
            if snap.generation != self.generation {
                return false;
            }
            f(snap);
            true
        })
    }

    async fn run(self, mut outbound: mpsc::UnboundedReceiver<OutboundCommand>) {
        loop {
            if !self.update(|snap| {
                snap.state = ConnectionState::Connecting;
                snap.retry_pending = false;
            }) {
                return;
            }

            let attempt = self.connector.connect(&self.target);
            match tokio::time::timeout(self.options.handshake_timeout, attempt).await {
                Ok(Ok(link)) => {
                    if !self.update(|snap| snap.state = ConnectionState::Connected) {
                        return;
                    }
                    info!(target = %self.target, "Connected");
                    if self.pump(link, &mut outbound).await == PumpExit::Shutdown {
                        info!(target = %self.target, "Connection closed by client");
                        return;
                    }
                    info!(target = %self.target, "Connection closed");
                }
                Ok(Err(e)) => warn!(target = %self.target, error = %e, "Connection failed"),
                Err(_) => warn!(
                    target = %self.target,
                    timeout_ms = self.options.handshake_timeout.as_millis(),
                    "Handshake timed out"
                ),
            }

            let mut dropped = 0usize;
            loop {
                match outbound.try_recv() {
                    Ok(_) => dropped += 1,
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => return,
                }
            }
            if dropped > 0 {
                debug!(dropped, "Discarded commands queued for a closed link");
            }

            if !self.update(|snap| {
                snap.state = ConnectionState::Disconnected;
                snap.retry_pending = true;
            }) {
                return;
            }
            debug!(
                target = %self.target,
                delay_ms = self.options.retry_delay.as_millis(),
                "Reconnect scheduled"
            );
            tokio::time::sleep(self.options.retry_delay).await;
        }
    }

    async fn pump(
        &self,
        link: Link,
        outbound: &mut mpsc::UnboundedReceiver<OutboundCommand>,
    ) -> PumpExit {
        let Link {
            mut outgoing,
            mut incoming,
        } = link;

        loop {
            tokio::select! {
                frame = incoming.next() => match frame {
                    Some(Ok(text)) => self.on_frame(&text),
                    Some(Err(e)) => {
                        debug!(error = %e, "Transport error");
                        return PumpExit::Remote;
                    }
                    None => {
                        debug!("Remote closed the connection");
                        return PumpExit::Remote;
                    }
                },
                command = outbound.recv() => {
                    let Some(command) = command else {
                        if let Err(e) = outgoing.close().await {
                            debug!(error = %e, "Close failed");
                        }
                        return PumpExit::Shutdown;
                    };
                    let text = match serde_json::to_string(&command) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!(error = %e, "Failed to encode command");
                            continue;
                        }
                    };
                    if let Err(e) = outgoing.send(text).await {
                        debug!(error = %e, "Send failed");
                        return PumpExit::Remote;
                    }
                    debug!(action = %command.action, "Command sent");
                }
            }
        }
    }

    fn on_frame(&self, text: &str) {
        if let Some(InboundMessage::Status(telemetry)) = InboundMessage::parse(text) {
            trace!(?telemetry, "Telemetry update");
            self.update(|snap| snap.telemetry = Some(telemetry));
        }
    }
}
