pub mod destination;
pub mod events;
pub mod heartbeat;
pub mod rate_limit;

use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use crate::broker::{Broker, Outbound, Session, Topic};
use crate::error::BrokerError;
use crate::state::AppState;
use destination::SubscribeTarget;
use events::{close_code, opcode, GatewayMessage};
use heartbeat::HeartbeatMonitor;
use rate_limit::FrameBucket;

pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut ws_sink, mut ws_stream) = socket.split();
    let (session, mut rx) = state.broker.on_connect();

    // Send HELLO
    let hello = GatewayMessage::op(opcode::HELLO).with_data(serde_json::json!({
        "session_id": session.session_id,
        "heartbeat_interval": state.heartbeat.interval.as_millis() as u64
    }));
    if ws_sink
        .send(Message::Text(hello.to_json().into()))
        .await
        .is_err()
    {
        state.broker.on_disconnect(&session);
        return;
    }

    let mut conn = Connection::new(state.broker.clone(), session.clone(), &state);
    let mut seq: u64 = 0;
    let mut liveness = HeartbeatMonitor::new(&state.heartbeat);
    let mut heartbeat_interval = heartbeat::check_interval(&state.heartbeat);
    let mut close_with = None;

    loop {
        tokio::select! {
            // Frames routed to this session by the broker
            Some(frame) = rx.recv() => {
                seq += 1;
                if let Err(e) = ws_sink.send(Message::Text(conn.encode(&frame, seq).into())).await {
                    let err = BrokerError::Transport(e.to_string());
                    tracing::debug!(session_id = %session.session_id, code = err.code(), error = %err, "write failed");
                    break;
                }
            }
            // Displaced by another session entering with our nickname
            _ = session.closed() => {
                close_with = Some((close_code::SESSION_REPLACED, "session replaced"));
                break;
            }
            // Heartbeat check
            _ = heartbeat_interval.tick() => {
                if liveness.is_expired() {
                    tracing::info!(session_id = %session.session_id, "heartbeat timed out");
                    close_with = Some((close_code::SESSION_TIMED_OUT, "heartbeat timed out"));
                    break;
                }
            }
            // Incoming messages
            msg = ws_stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        liveness.touch();
                        if let Some(reply) = conn.handle_text(text.as_str()) {
                            if ws_sink.send(Message::Text(reply.into())).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => liveness.touch(),
                    Some(Err(e)) => {
                        let err = BrokerError::Transport(e.to_string());
                        tracing::debug!(session_id = %session.session_id, code = err.code(), error = %err, "read failed");
                        break;
                    }
                }
            }
        }
    }

    state.broker.on_disconnect(&session);

    if let Some((code, reason)) = close_with {
        let invalid = GatewayMessage::op(opcode::INVALID_SESSION)
            .with_data(serde_json::json!({ "resumable": false }));
        let _ = ws_sink.send(Message::Text(invalid.to_json().into())).await;
        let _ = ws_sink
            .send(Message::Close(Some(CloseFrame {
                code,
                reason: reason.into(),
            })))
            .await;
    } else {
        let _ = ws_sink.close().await;
    }
}

/// Per-connection gateway state: decodes client frames into broker calls and
/// encodes broker frames for the wire.
struct Connection {
    broker: Arc<Broker>,
    session: Arc<Session>,
    /// Name the client used to subscribe to the user list.
    users_destination: String,
    bucket: FrameBucket,
    max_frame_bytes: usize,
}

impl Connection {
    fn new(broker: Arc<Broker>, session: Arc<Session>, state: &AppState) -> Self {
        Self {
            broker,
            session,
            users_destination: destination::USERS.to_string(),
            bucket: FrameBucket::new(&state.limits),
            max_frame_bytes: state.limits.max_frame_bytes,
        }
    }

    /// Handle one inbound text frame. Returns a direct reply, if any.
    /// Rejected frames are logged and dropped; the session stays open.
    fn handle_text(&mut self, text: &str) -> Option<String> {
        let result = if text.len() > self.max_frame_bytes {
            Err(BrokerError::MalformedFrame(format!(
                "frame of {} bytes exceeds {}",
                text.len(),
                self.max_frame_bytes
            )))
        } else if !self.bucket.try_acquire() {
            Err(BrokerError::RateLimited)
        } else {
            serde_json::from_str::<GatewayMessage>(text)
                .map_err(BrokerError::from)
                .and_then(|msg| self.dispatch(msg))
        };

        match result {
            Ok(reply) => reply,
            Err(err) => {
                if err.is_routine() {
                    tracing::debug!(session_id = %self.session.session_id, code = err.code(), error = %err, "frame dropped");
                } else {
                    tracing::warn!(session_id = %self.session.session_id, code = err.code(), error = %err, "frame rejected");
                }
                None
            }
        }
    }

    fn dispatch(&mut self, msg: GatewayMessage) -> Result<Option<String>, BrokerError> {
        match msg.op {
            opcode::HEARTBEAT => Ok(Some(GatewayMessage::op(opcode::HEARTBEAT_ACK).to_json())),
            opcode::SEND => {
                let dest = required_destination(msg.destination)?;
                let app = destination::parse_send(&dest)?;
                let routed = self.broker.on_frame(
                    &self.session,
                    app,
                    msg.data.unwrap_or(serde_json::Value::Null),
                )?;
                tracing::trace!(session_id = %self.session.session_id, destination = %dest, ?routed, "frame routed");
                Ok(None)
            }
            opcode::SUBSCRIBE => {
                let dest = required_destination(msg.destination)?;
                match destination::parse_subscribe(&dest)? {
                    SubscribeTarget::Topic(Topic::Users) => {
                        self.users_destination = dest;
                        self.broker.subscribe(&self.session, Topic::Users)?;
                    }
                    SubscribeTarget::Topic(topic) => {
                        self.broker.subscribe(&self.session, topic)?;
                    }
                    SubscribeTarget::PrivateQueue => {
                        tracing::debug!(session_id = %self.session.session_id, "private queue subscription acknowledged");
                    }
                }
                Ok(None)
            }
            opcode::UNSUBSCRIBE => {
                let dest = required_destination(msg.destination)?;
                if let SubscribeTarget::Topic(topic) = destination::parse_subscribe(&dest)? {
                    self.broker.unsubscribe(&self.session, topic);
                }
                Ok(None)
            }
            other => Err(BrokerError::MalformedFrame(format!("unknown opcode {other}"))),
        }
    }

    fn encode(&self, frame: &Outbound, seq: u64) -> String {
        let data = match frame {
            Outbound::Chat(message) | Outbound::Private(message) => {
                serde_json::to_value(message.as_ref())
            }
            Outbound::Users(nicknames) => serde_json::to_value(nicknames.as_ref()),
        }
        .unwrap_or_default();

        GatewayMessage {
            op: opcode::MESSAGE,
            seq: Some(seq),
            destination: Some(destination::outbound(frame, &self.users_destination).to_string()),
            data: Some(data),
        }
        .to_json()
    }
}

fn required_destination(destination: Option<String>) -> Result<String, BrokerError> {
    destination.ok_or_else(|| BrokerError::MalformedFrame("missing destination".into()))
}
