use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::trace;

/// Endpoint of a host agent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    pub host: String,
    pub port: u16,
}

impl Target {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// WebSocket URL for the command/telemetry channel.
    #[must_use]
    pub fn ws_url(&self, path: &str) -> String {
        format!("ws://{}:{}{path}", self.host, self.port)
    }

    /// HTTP URL on the agent.
    #[must_use]
    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}:{}{path}", self.host, self.port)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Host load percentages (0-100) as last reported by the agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    pub cpu: f64,
    pub memory: f64,
    pub disk: f64,
}

/// Everything observers need to know about one connection, published as a
/// single value so readers never see a half-applied update.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConnectionSnapshot {
    pub state: ConnectionState,
    /// A retry timer is armed and will re-enter `Connecting` when it fires.
    pub retry_pending: bool,
    pub target: Option<Target>,
    /// Latest telemetry from the current target. Cleared on every re-target.
    pub telemetry: Option<Telemetry>,
    /// Bumped on every connect/reconnect/teardown. Updates from a session
    /// carrying an older generation are discarded.
    pub generation: u64,
}

impl ConnectionSnapshot {
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }
}

/// Command sent to the agent. No reply is expected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundCommand {
    pub action: String,
    pub params: Vec<String>,
}

impl OutboundCommand {
    pub fn new(action: impl Into<String>, params: Vec<String>) -> Self {
        Self {
            action: action.into(),
            params,
        }
    }
}

/// Messages the agent pushes over the channel that this client understands.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    Status(Telemetry),
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

impl InboundMessage {
    /// Parse a text frame. Malformed or unrecognized frames yield `None`.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let envelope: Envelope = match serde_json::from_str(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                trace!(error = %e, "Ignoring malformed frame");
                return None;
            }
        };
        match envelope.kind.as_str() {
            "status" => {
                let data = envelope.data?;
                serde_json::from_value(data).ok().map(Self::Status)
            }
            other => {
                trace!(kind = other, "Ignoring unrecognized frame");
                None
            }
        }
    }
}

/// Timing and addressing for a connection manager.
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    /// Fixed delay before an automatic retry (no growth between attempts).
    pub retry_delay: Duration,
    /// Maximum time for the transport handshake.
    pub handshake_timeout: Duration,
    /// Path of the WebSocket endpoint on the agent.
    pub ws_path: String,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_secs(3),
            handshake_timeout: Duration::from_secs(10),
            ws_path: "/ws".to_string(),
        }
    }
}
