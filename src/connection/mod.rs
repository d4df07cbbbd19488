//! Persistent command/telemetry channel to a host agent.
//!
//! Inbound frames are JSON objects; the only one this client acts on is
//! `{"type": "status", "data": {"cpu", "memory", "disk"}}`. Outbound frames
//! are `{"action": ..., "params": [...]}` with no reply expected.

mod manager;
pub mod mock;
mod transport;
mod types;

pub use manager::ConnectionManager;
pub use transport::{Connector, FrameSink, FrameStream, Link, WsConnector};
pub use types::{
    ConnectionOptions, ConnectionSnapshot, ConnectionState, InboundMessage, OutboundCommand,
    Target, Telemetry,
};
