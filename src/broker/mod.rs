//! Transport-independent core: sessions, presence and message routing.
//!
//! A transport calls [`Broker::on_connect`] for every new connection, pumps
//! the returned receiver to the client, feeds inbound app frames to
//! [`Broker::on_frame`] and finally calls [`Broker::on_disconnect`].

pub mod presence;
pub mod private;
pub mod session;
pub mod topic;

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::error::BrokerError;
use crate::models::message::{
    normalize_nickname, validate_content, ChatMessage, ChatRequest, EnterRequest,
};
use presence::PresenceRegistry;
use private::PrivateRouter;
pub use session::{Delivery, Outbound, Session, SessionState};
pub use topic::{Topic, TopicRouter};

/// App-bound destinations a client can send to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppDestination {
    Enter,
    Leave,
    Chat,
    Private(String),
}

impl fmt::Display for AppDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppDestination::Enter => f.write_str("enter"),
            AppDestination::Leave => f.write_str("leave"),
            AppDestination::Chat => f.write_str("chat"),
            AppDestination::Private(recipient) => write!(f, "private/{recipient}"),
        }
    }
}

/// What happened to an accepted frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routed {
    Entered { nicknames: Arc<Vec<String>> },
    Left,
    Published { delivered: usize },
    Private { recipient: String },
}

#[derive(Debug, Clone)]
pub struct BrokerSettings {
    /// Capacity of each session's outbound queue.
    pub outbound_queue: usize,
    /// Maximum message content length in characters.
    pub max_content_len: usize,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            outbound_queue: 256,
            max_content_len: 4000,
        }
    }
}

/// The session gateway. Owns every live session and dispatches their frames
/// to the topic and private routers.
pub struct Broker {
    sessions: DashMap<String, Arc<Session>>,
    topics: Arc<TopicRouter>,
    presence: Arc<PresenceRegistry>,
    private: PrivateRouter,
    settings: BrokerSettings,
}

impl Broker {
    pub fn new(settings: BrokerSettings) -> Self {
        let topics = Arc::new(TopicRouter::new());
        let presence = Arc::new(PresenceRegistry::new(topics.clone()));
        let private = PrivateRouter::new(presence.clone());
        Self {
            sessions: DashMap::new(),
            topics,
            presence,
            private,
            settings,
        }
    }

    /// Register a new connection. The receiver carries every frame the core
    /// routes to this session and must be drained by the transport.
    pub fn on_connect(&self) -> (Arc<Session>, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(self.settings.outbound_queue.max(1));
        let session = Arc::new(Session::new(uuid::Uuid::new_v4().to_string(), tx));
        self.sessions
            .insert(session.session_id.clone(), session.clone());
        tracing::info!(session_id = %session.session_id, "session connected");
        (session, rx)
    }

    /// Tear a session down: stop deliveries, drop its subscriptions and its
    /// nickname. Safe to call more than once.
    pub fn on_disconnect(&self, session: &Session) {
        session.close();
        self.sessions.remove(&session.session_id);
        let subscriptions = self.topics.unsubscribe_all(&session.session_id);
        let nickname = session.nickname();
        let snapshot = self.presence.remove_user(session);

        tracing::info!(
            session_id = %session.session_id,
            nickname = nickname.as_deref().unwrap_or("-"),
            subscriptions,
            remaining_users = snapshot.map(|s| s.len()),
            "session disconnected"
        );
    }

    /// Route one app-bound frame from `session`.
    ///
    /// Only `enter` is accepted before the session is bound to a nickname.
    pub fn on_frame(
        &self,
        session: &Arc<Session>,
        destination: AppDestination,
        payload: serde_json::Value,
    ) -> Result<Routed, BrokerError> {
        if !session.is_live() {
            return Err(BrokerError::SessionClosed);
        }

        match destination {
            AppDestination::Enter => {
                let req: EnterRequest = serde_json::from_value(payload)?;
                self.enter(session, &req.nickname)
            }
            AppDestination::Leave => {
                self.require_bound(session, &destination)?;
                self.presence.remove_user(session);
                tracing::info!(session_id = %session.session_id, "user left");
                Ok(Routed::Left)
            }
            AppDestination::Chat => {
                let nickname = self.require_bound(session, &destination)?;
                let req: ChatRequest = serde_json::from_value(payload)?;
                validate_content(&req.content, self.settings.max_content_len)?;
                if req.nickname.as_deref().is_some_and(|claimed| claimed != nickname) {
                    tracing::debug!(
                        session_id = %session.session_id,
                        nickname = %nickname,
                        "payload nickname differs from bound nickname"
                    );
                }

                let delivered = self.publish(
                    Topic::Messages,
                    Outbound::Chat(Arc::new(ChatMessage::public(nickname, req.content))),
                );
                Ok(Routed::Published { delivered })
            }
            AppDestination::Private(ref recipient) => {
                let nickname = self.require_bound(session, &destination)?;
                let req: ChatRequest = serde_json::from_value(payload)?;
                validate_content(&req.content, self.settings.max_content_len)?;
                let recipient = normalize_nickname(recipient)
                    .map_err(|_| BrokerError::UnknownRecipient(recipient.clone()))?;
                if req.recipient.as_deref().is_some_and(|r| r != recipient) {
                    tracing::debug!(
                        session_id = %session.session_id,
                        recipient = %recipient,
                        "payload recipient differs from destination, using destination"
                    );
                }

                let message = ChatMessage::private(&nickname, &recipient, req.content);
                if self.send_private(&nickname, &recipient, message) {
                    Ok(Routed::Private { recipient })
                } else {
                    Err(BrokerError::UnknownRecipient(recipient))
                }
            }
        }
    }

    /// Subscribe to a topic. Subscribing to [`Topic::Users`] immediately
    /// delivers the current nickname snapshot.
    pub fn subscribe(&self, session: &Arc<Session>, topic: Topic) -> Result<bool, BrokerError> {
        if !session.is_live() {
            return Err(BrokerError::SessionClosed);
        }
        let added = match topic {
            Topic::Users => self.presence.subscribe_users(session),
            Topic::Messages => self.topics.subscribe(session, topic),
        };
        if !added && !session.is_live() {
            return Err(BrokerError::SessionClosed);
        }
        tracing::debug!(session_id = %session.session_id, topic = topic.as_str(), added, "subscribe");
        Ok(added)
    }

    pub fn unsubscribe(&self, session: &Session, topic: Topic) -> bool {
        self.topics.unsubscribe(&session.session_id, topic)
    }

    pub fn publish(&self, topic: Topic, frame: Outbound) -> usize {
        self.topics.publish(topic, frame)
    }

    pub fn send_private(&self, sender: &str, recipient: &str, message: ChatMessage) -> bool {
        self.private.send_private(sender, recipient, message)
    }

    pub fn nicknames(&self) -> Arc<Vec<String>> {
        self.presence.nicknames()
    }

    pub fn session(&self, session_id: &str) -> Option<Arc<Session>> {
        self.sessions.get(session_id).map(|s| s.value().clone())
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn topics(&self) -> &TopicRouter {
        &self.topics
    }

    pub fn presence(&self) -> &PresenceRegistry {
        &self.presence
    }

    fn enter(&self, session: &Arc<Session>, raw_nickname: &str) -> Result<Routed, BrokerError> {
        let nickname = normalize_nickname(raw_nickname)?;
        let entered = self
            .presence
            .add_user(&nickname, session)
            .ok_or(BrokerError::SessionClosed)?;

        if let Some(displaced) = entered.displaced {
            self.topics.unsubscribe_all(&displaced.session_id);
        }
        tracing::info!(
            session_id = %session.session_id,
            nickname = %nickname,
            released = entered.released.as_deref(),
            users = entered.nicknames.len(),
            "user entered"
        );
        Ok(Routed::Entered {
            nicknames: entered.nicknames,
        })
    }

    fn require_bound(
        &self,
        session: &Session,
        destination: &AppDestination,
    ) -> Result<String, BrokerError> {
        session.nickname().ok_or_else(|| BrokerError::UnboundFrame {
            destination: destination.to_string(),
        })
    }
}
