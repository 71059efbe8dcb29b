use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::session::{Delivery, Outbound, Session};

/// Broadcast destinations with many-to-many fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Public chat messages.
    Messages,
    /// Active nickname snapshots.
    Users,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::Messages => "messages",
            Topic::Users => "users",
        }
    }
}

/// Fan-out of frames to every session subscribed to a topic.
///
/// One lock covers all topics, so publishes to a topic are accepted in a
/// single global order and every subscriber sees them in that order.
#[derive(Default)]
pub struct TopicRouter {
    topics: Mutex<HashMap<Topic, HashMap<String, Arc<Session>>>>,
}

impl TopicRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the session was already subscribed or is closed.
    ///
    /// Liveness is checked under the router lock: disconnect and displacement
    /// close the session before `unsubscribe_all`, so a closed session can
    /// never be left behind in the map.
    pub fn subscribe(&self, session: &Arc<Session>, topic: Topic) -> bool {
        let mut topics = self.topics.lock();
        if !session.is_live() {
            return false;
        }
        topics
            .entry(topic)
            .or_default()
            .insert(session.session_id.clone(), session.clone())
            .is_none()
    }

    pub fn unsubscribe(&self, session_id: &str, topic: Topic) -> bool {
        let mut topics = self.topics.lock();
        topics
            .get_mut(&topic)
            .map(|subs| subs.remove(session_id).is_some())
            .unwrap_or(false)
    }

    /// Drop every subscription held by a session. Returns how many were removed.
    pub fn unsubscribe_all(&self, session_id: &str) -> usize {
        let mut topics = self.topics.lock();
        topics
            .values_mut()
            .map(|subs| subs.remove(session_id).is_some())
            .filter(|removed| *removed)
            .count()
    }

    pub fn is_subscribed(&self, session_id: &str, topic: Topic) -> bool {
        self.topics
            .lock()
            .get(&topic)
            .is_some_and(|subs| subs.contains_key(session_id))
    }

    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.topics.lock().get(&topic).map_or(0, HashMap::len)
    }

    /// Topics a session is currently subscribed to.
    pub fn subscriptions_of(&self, session_id: &str) -> Vec<Topic> {
        self.topics
            .lock()
            .iter()
            .filter(|(_, subs)| subs.contains_key(session_id))
            .map(|(topic, _)| *topic)
            .collect()
    }

    /// Deliver `frame` to every current subscriber of `topic`.
    ///
    /// Returns the number of sessions the frame was enqueued for. Sessions
    /// whose transport is closed are unsubscribed; sessions with a full queue
    /// miss this frame only.
    pub fn publish(&self, topic: Topic, frame: Outbound) -> usize {
        let mut topics = self.topics.lock();
        let Some(subs) = topics.get_mut(&topic) else {
            return 0;
        };

        let mut delivered = 0;
        let mut closed = Vec::new();
        for (session_id, session) in subs.iter() {
            match session.deliver(frame.clone()) {
                Delivery::Sent => delivered += 1,
                Delivery::Dropped => {
                    tracing::warn!(
                        session_id = %session_id,
                        topic = topic.as_str(),
                        dropped = session.dropped_count(),
                        "outbound queue full, dropping frame"
                    );
                }
                Delivery::Closed => closed.push(session_id.clone()),
            }
        }
        for session_id in closed {
            tracing::debug!(session_id = %session_id, topic = topic.as_str(), "removing closed subscriber");
            subs.remove(&session_id);
        }

        tracing::trace!(topic = topic.as_str(), delivered, "published");
        delivered
    }
}
