//! A loopback agent speaking the real wire protocol.
//!
//! Serves `GET/POST /config` and a `/ws` channel that greets every client
//! with one status frame and records each command it receives.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use rdeck::connection::{OutboundCommand, Target};

struct Shared {
    config: Mutex<Value>,
    posted: Mutex<Vec<Value>>,
    fail_posts: Mutex<bool>,
    commands: mpsc::UnboundedSender<OutboundCommand>,
}

pub struct FakeAgent {
    pub addr: SocketAddr,
    shared: Arc<Shared>,
    commands: mpsc::UnboundedReceiver<OutboundCommand>,
    server: JoinHandle<()>,
}

/// Status frame sent to every client right after the upgrade.
pub const GREETING: (f64, f64, f64) = (12.5, 40.0, 71.0);

impl FakeAgent {
    /// Start an agent whose `/config` answers with `config`.
    ///
    /// # Panics
    ///
    /// Panics if no loopback port can be bound.
    pub async fn start(config: Value) -> Self {
        let (tx, commands) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            config: Mutex::new(config),
            posted: Mutex::new(Vec::new()),
            fail_posts: Mutex::new(false),
            commands: tx,
        });

        let app = Router::new()
            .route("/config", get(get_config).post(post_config))
            .route("/ws", get(ws_handler))
            .with_state(Arc::clone(&shared));

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind loopback");
        let addr = listener.local_addr().expect("local addr");
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            addr,
            shared,
            commands,
            server,
        }
    }

    #[must_use]
    pub fn target(&self) -> Target {
        Target::new("127.0.0.1", self.addr.port())
    }

    /// Bodies received on `POST /config`.
    #[must_use]
    pub fn posted(&self) -> Vec<Value> {
        self.shared.posted.lock().unwrap().clone()
    }

    /// Answer subsequent posts with 500.
    pub fn fail_posts(&self, fail: bool) {
        *self.shared.fail_posts.lock().unwrap() = fail;
    }

    /// Next command received over `/ws`.
    pub async fn next_command(&mut self) -> Option<OutboundCommand> {
        self.commands.recv().await
    }

    pub fn stop(&self) {
        self.server.abort();
    }
}

impl Drop for FakeAgent {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn get_config(State(shared): State<Arc<Shared>>) -> Json<Value> {
    Json(shared.config.lock().unwrap().clone())
}

async fn post_config(State(shared): State<Arc<Shared>>, Json(body): Json<Value>) -> impl IntoResponse {
    if *shared.fail_posts.lock().unwrap() {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": "rejected"})));
    }
    shared.posted.lock().unwrap().push(body.clone());
    *shared.config.lock().unwrap() = body;
    (StatusCode::OK, Json(json!({"success": true})))
}

async fn ws_handler(ws: WebSocketUpgrade, State(shared): State<Arc<Shared>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, shared))
}

async fn handle_ws(mut socket: WebSocket, shared: Arc<Shared>) {
    let (cpu, memory, disk) = GREETING;
    let greeting = json!({"type": "status", "data": {"cpu": cpu, "memory": memory, "disk": disk}});
    if socket.send(Message::Text(greeting.to_string().into())).await.is_err() {
        return;
    }
    while let Some(Ok(message)) = socket.recv().await {
        match message {
            Message::Text(text) => {
                if let Ok(command) = serde_json::from_str::<OutboundCommand>(text.as_str()) {
                    let _ = shared.commands.send(command);
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
}
