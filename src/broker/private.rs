use std::sync::Arc;

use super::presence::PresenceRegistry;
use super::session::{Delivery, Outbound};
use crate::models::message::ChatMessage;

/// Point-to-point delivery to a user's private queue.
pub struct PrivateRouter {
    presence: Arc<PresenceRegistry>,
}

impl PrivateRouter {
    pub fn new(presence: Arc<PresenceRegistry>) -> Self {
        Self { presence }
    }

    /// Deliver `message` to the session currently bound to `recipient`.
    ///
    /// Returns `false` when nobody holds the nickname or the recipient's
    /// queue could not take the frame. Never delivers to more than one session.
    pub fn send_private(&self, sender: &str, recipient: &str, message: ChatMessage) -> bool {
        let Some(session) = self.presence.lookup(recipient) else {
            tracing::debug!(sender, recipient, "private message to absent user dropped");
            return false;
        };

        match session.deliver(Outbound::Private(Arc::new(message))) {
            Delivery::Sent => true,
            Delivery::Dropped => {
                tracing::warn!(
                    sender,
                    recipient,
                    session_id = %session.session_id,
                    "recipient queue full, private message dropped"
                );
                false
            }
            Delivery::Closed => {
                tracing::debug!(sender, recipient, "recipient disconnected before delivery");
                false
            }
        }
    }
}
