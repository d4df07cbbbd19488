//! Transport seam for the connection manager.
//!
//! A [`Connector`] turns a [`Target`] into a [`Link`]: a sink of outgoing
//! text frames plus a stream of incoming ones. The manager only ever sees
//! that pair, which lets tests drive the state machine over in-memory
//! channels while production uses a WebSocket.

use std::pin::Pin;

use futures::future::{self, BoxFuture};
use futures::stream::BoxStream;
use futures::{FutureExt, Sink, SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, instrument};

use super::types::Target;
use crate::error::{RdError, Result};

/// Outgoing half of a link.
pub type FrameSink = Pin<Box<dyn Sink<String, Error = RdError> + Send>>;

/// Incoming half of a link. The stream ends when the remote closes.
pub type FrameStream = BoxStream<'static, Result<String>>;

/// An established duplex text channel.
pub struct Link {
    pub outgoing: FrameSink,
    pub incoming: FrameStream,
}

/// Opens links to agents.
pub trait Connector: Send + Sync + 'static {
    fn connect(&self, target: &Target) -> BoxFuture<'static, Result<Link>>;
}

/// WebSocket connector (`ws://host:port/<path>`).
#[derive(Debug, Clone)]
pub struct WsConnector {
    path: String,
}

impl WsConnector {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new("/ws")
    }
}

impl Connector for WsConnector {
    #[instrument(skip(self), fields(target = %target))]
    fn connect(&self, target: &Target) -> BoxFuture<'static, Result<Link>> {
        let url = target.ws_url(&self.path);
        async move {
            debug!(%url, "Opening WebSocket");
            let (ws, _response) = tokio_tungstenite::connect_async(url.as_str())
                .await
                .map_err(|e| RdError::Transport(format!("WebSocket connect failed: {e}")))?;

            let (write, read) = ws.split();
            let outgoing = write
                .with(|text: String| future::ready(Ok::<_, WsError>(Message::Text(text.into()))))
                .sink_map_err(|e: WsError| RdError::Transport(e.to_string()));
            let incoming = read.filter_map(|frame| {
                future::ready(match frame {
                    Ok(Message::Text(text)) => Some(Ok(text.to_string())),
                    Ok(_) => None,
                    Err(e) => Some(Err(RdError::Transport(e.to_string()))),
                })
            });

            Ok(Link {
                outgoing: Box::pin(outgoing),
                incoming: incoming.boxed(),
            })
        }
        .boxed()
    }
}
