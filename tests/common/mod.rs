#![allow(dead_code)]

use std::time::Duration;

use axum::body::Body;
use chatbroker::broker::BrokerSettings;
use chatbroker::config::{Config, GatewayLimits, HeartbeatConfig};
use chatbroker::routes;
use chatbroker::state::AppState;
use futures_util::{SinkExt, StreamExt};
use http::Request;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// How long a test waits for a frame it expects.
pub const RECV_TIMEOUT: Duration = Duration::from_secs(3);

pub fn test_config() -> Config {
    Config {
        port: 0,
        bind: "127.0.0.1".to_string(),
        broker: BrokerSettings::default(),
        heartbeat: HeartbeatConfig::default(),
        limits: GatewayLimits::default(),
    }
}

/// Broker plus router, isolated per test.
pub struct TestServer {
    pub state: AppState,
}

impl TestServer {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            state: AppState::new(&config),
        }
    }

    /// Router sharing this server's broker, for `oneshot()` calls.
    pub fn router(&self) -> axum::Router {
        routes::router(self.state.clone())
    }

    /// Binds a TCP listener on port 0, spawns the server, and returns the
    /// websocket base URL.
    pub async fn spawn(&self) -> String {
        let app = self.router();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("ws://127.0.0.1:{}", addr.port())
    }
}

pub async fn test_app() -> axum::Router {
    TestServer::new().router()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub async fn parse_body(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A websocket client speaking the gateway envelope.
pub struct TestClient {
    ws: Ws,
    pub session_id: String,
    pub hello: Value,
}

impl TestClient {
    /// Connect to `/ws` and consume HELLO.
    pub async fn connect(base: &str) -> Self {
        let (ws, _) = connect_async(format!("{base}/ws")).await.unwrap();
        let mut client = Self {
            ws,
            session_id: String::new(),
            hello: Value::Null,
        };
        let hello = client.next_json().await;
        assert_eq!(hello["op"], 5, "expected HELLO first, got {hello}");
        client.session_id = hello["data"]["session_id"].as_str().unwrap().to_string();
        client.hello = hello;
        client
    }

    pub async fn send_json(&mut self, value: Value) {
        self.ws
            .send(Message::Text(value.to_string().into()))
            .await
            .unwrap();
    }

    pub async fn send_raw(&mut self, text: &str) {
        self.ws
            .send(Message::Text(text.to_string().into()))
            .await
            .unwrap();
    }

    pub async fn subscribe(&mut self, destination: &str) {
        self.send_json(json!({ "op": 3, "destination": destination }))
            .await;
    }

    pub async fn send_to(&mut self, destination: &str, data: Value) {
        self.send_json(json!({ "op": 2, "destination": destination, "data": data }))
            .await;
    }

    pub async fn enter(&mut self, nickname: &str) {
        self.send_to("/app/enter", json!({ "nickname": nickname })).await;
    }

    /// Subscribe to messages, the private queue and the user list, then
    /// consume the user list snapshot sent on subscribe.
    pub async fn subscribe_all(&mut self) -> Value {
        self.subscribe("/topic/messages").await;
        self.subscribe("/user/queue/private").await;
        self.subscribe("/app/users").await;
        let snapshot = self.next_message().await;
        assert_eq!(snapshot["destination"], "/app/users");
        snapshot["data"].clone()
    }

    /// Next text frame of any opcode.
    pub async fn next_json(&mut self) -> Value {
        loop {
            let msg = tokio::time::timeout(RECV_TIMEOUT, self.ws.next())
                .await
                .expect("timed out waiting for a frame")
                .expect("stream ended")
                .expect("websocket error");
            if msg.is_text() {
                let text = msg.into_text().unwrap();
                return serde_json::from_str(&text).unwrap();
            }
            assert!(!msg.is_close(), "connection closed while waiting for a frame");
        }
    }

    /// Next MESSAGE (op 0) frame, skipping acks.
    pub async fn next_message(&mut self) -> Value {
        loop {
            let frame = self.next_json().await;
            if frame["op"] == 0 {
                return frame;
            }
        }
    }

    /// Wait for the next user list frame and return its nicknames.
    pub async fn next_users(&mut self) -> Value {
        let frame = self.next_message().await;
        assert_eq!(frame["destination"], "/app/users", "unexpected frame {frame}");
        frame["data"].clone()
    }

    /// Assert nothing arrives within `ms` milliseconds.
    pub async fn expect_silence(&mut self, ms: u64) {
        if let Ok(Some(Ok(msg))) =
            tokio::time::timeout(Duration::from_millis(ms), self.ws.next()).await
        {
            panic!("expected no frame, got {msg:?}");
        }
    }

    /// Send HEARTBEAT and wait for the ack. Also proves every frame sent
    /// before it has been processed.
    pub async fn sync(&mut self) {
        self.send_json(json!({ "op": 1 })).await;
        loop {
            let frame = self.next_json().await;
            if frame["op"] == 4 {
                return;
            }
        }
    }

    /// Read until the server closes the connection, returning the opcodes seen.
    pub async fn drain_until_closed(&mut self) -> Vec<u64> {
        let mut ops = Vec::new();
        loop {
            match tokio::time::timeout(RECV_TIMEOUT, self.ws.next()).await {
                Ok(Some(Ok(msg))) if msg.is_text() => {
                    let text = msg.into_text().unwrap();
                    let json: Value = serde_json::from_str(&text).unwrap();
                    ops.push(json["op"].as_u64().unwrap());
                }
                Ok(Some(Ok(msg))) if msg.is_close() => return ops,
                Ok(Some(Ok(_))) => {}
                Ok(Some(Err(_))) | Ok(None) => return ops,
                Err(_) => panic!("server did not close the connection"),
            }
        }
    }

    pub async fn close(mut self) {
        self.ws.close(None).await.unwrap();
    }
}
