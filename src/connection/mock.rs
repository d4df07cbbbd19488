//! Scriptable in-memory connector for tests.
//!
//! Each accepted connection hands the test a [`MockRemote`], the agent side
//! of the link, through the receiver returned by [`MockConnector::accepted`].
//!
//! # Example
//!
//! ```rust,ignore
//! let connector = MockConnector::new();
//! let mut accepted = connector.accepted();
//! let mut manager = ConnectionManager::new(connector.clone(), Handle::current(), opts);
//!
//! manager.connect(Target::new("deck", 8002));
//! let mut remote = accepted.recv().await.unwrap();
//! remote.push_status(10.0, 20.0, 30.0);
//! remote.close();
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::channel::mpsc as fmpsc;
use futures::future::{self, BoxFuture};
use futures::{FutureExt, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::debug;

use super::transport::{Connector, Link};
use super::types::{OutboundCommand, Target};
use crate::error::{RdError, Result};

/// How the next connection attempt behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// Handshake succeeds.
    Accept,
    /// Handshake fails immediately.
    Refuse,
    /// Handshake never completes (exercises the timeout).
    Hang,
}

struct Inner {
    attempts: Vec<Target>,
    script: VecDeque<Behavior>,
    fallback: Behavior,
    accepted_tx: mpsc::UnboundedSender<MockRemote>,
    accepted_rx: Option<mpsc::UnboundedReceiver<MockRemote>>,
}

/// Connector whose outcomes are scripted by the test.
#[derive(Clone)]
pub struct MockConnector {
    inner: Arc<Mutex<Inner>>,
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl MockConnector {
    /// Accept every attempt unless scripted otherwise.
    #[must_use]
    pub fn new() -> Self {
        Self::with_fallback(Behavior::Accept)
    }

    /// Use `fallback` once the script is exhausted.
    #[must_use]
    pub fn with_fallback(fallback: Behavior) -> Self {
        let (accepted_tx, accepted_rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(Mutex::new(Inner {
                attempts: Vec::new(),
                script: VecDeque::new(),
                fallback,
                accepted_tx,
                accepted_rx: Some(accepted_rx),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Queue behaviors for the next attempts, in order.
    pub fn script(&self, behaviors: &[Behavior]) {
        self.lock().script.extend(behaviors.iter().copied());
    }

    /// Change the behavior used once the script is exhausted.
    pub fn set_fallback(&self, behavior: Behavior) {
        self.lock().fallback = behavior;
    }

    /// Receiver of agent-side handles for accepted connections.
    ///
    /// # Panics
    ///
    /// Panics if called twice.
    #[must_use]
    pub fn accepted(&self) -> mpsc::UnboundedReceiver<MockRemote> {
        self.lock()
            .accepted_rx
            .take()
            .expect("accepted() may only be called once")
    }

    /// Every target a connection was attempted against, in order.
    #[must_use]
    pub fn attempts(&self) -> Vec<Target> {
        self.lock().attempts.clone()
    }

    #[must_use]
    pub fn attempt_count(&self) -> usize {
        self.lock().attempts.len()
    }
}

impl Connector for MockConnector {
    fn connect(&self, target: &Target) -> BoxFuture<'static, Result<Link>> {
        let mut inner = self.lock();
        inner.attempts.push(target.clone());
        let behavior = inner.script.pop_front().unwrap_or(inner.fallback);
        debug!(target = %target, ?behavior, "Mock connect");

        match behavior {
            Behavior::Refuse => {
                future::ready(Err(RdError::Transport("connection refused".into()))).boxed()
            }
            Behavior::Hang => future::pending().boxed(),
            Behavior::Accept => {
                let (to_client, incoming) = fmpsc::unbounded::<String>();
                let (outgoing, from_client) = fmpsc::unbounded::<String>();
                let remote = MockRemote {
                    target: target.clone(),
                    to_client: Some(to_client),
                    from_client,
                };
                let _ = inner.accepted_tx.send(remote);

                let link = Link {
                    outgoing: Box::pin(
                        outgoing.sink_map_err(|e| RdError::Transport(e.to_string())),
                    ),
                    incoming: incoming.map(Ok).boxed(),
                };
                future::ready(Ok(link)).boxed()
            }
        }
    }
}

/// Agent side of an accepted mock connection.
pub struct MockRemote {
    pub target: Target,
    to_client: Option<fmpsc::UnboundedSender<String>>,
    from_client: fmpsc::UnboundedReceiver<String>,
}

impl MockRemote {
    /// Push a raw text frame to the client.
    pub fn push(&self, text: &str) {
        if let Some(tx) = &self.to_client {
            let _ = tx.unbounded_send(text.to_string());
        }
    }

    /// Push a status frame.
    pub fn push_status(&self, cpu: f64, memory: f64, disk: f64) {
        let frame = serde_json::json!({
            "type": "status",
            "data": { "cpu": cpu, "memory": memory, "disk": disk }
        });
        self.push(&frame.to_string());
    }

    /// Close the connection from the agent side.
    pub fn close(&mut self) {
        self.to_client = None;
    }

    /// Next command the client sent; `None` once the client dropped the link.
    pub async fn next_command(&mut self) -> Option<OutboundCommand> {
        let text = self.from_client.next().await?;
        serde_json::from_str(&text).ok()
    }

    /// A command already sent, without waiting.
    pub fn try_command(&mut self) -> Option<OutboundCommand> {
        match self.from_client.try_next() {
            Ok(Some(text)) => serde_json::from_str(&text).ok(),
            _ => None,
        }
    }
}
