//! Mapping between client destination strings and broker operations.

use crate::broker::{AppDestination, Outbound, Topic};
use crate::error::BrokerError;

pub const ENTER: &str = "/app/enter";
pub const LEAVE: &str = "/app/leave";
pub const CHAT: &str = "/app/chat";
pub const PRIVATE_PREFIX: &str = "/app/private/";
pub const MESSAGES: &str = "/topic/messages";
pub const PRIVATE_QUEUE: &str = "/user/queue/private";
pub const USERS: &str = "/app/users";
pub const USERS_TOPIC: &str = "/topic/users";

/// Something a client can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeTarget {
    Topic(Topic),
    /// Private delivery needs no subscription; accepted for compatibility.
    PrivateQueue,
}

pub fn parse_send(destination: &str) -> Result<AppDestination, BrokerError> {
    match destination {
        ENTER => Ok(AppDestination::Enter),
        LEAVE => Ok(AppDestination::Leave),
        CHAT => Ok(AppDestination::Chat),
        other => match other.strip_prefix(PRIVATE_PREFIX) {
            Some(recipient) if !recipient.is_empty() => {
                Ok(AppDestination::Private(recipient.to_string()))
            }
            _ => Err(BrokerError::UnknownDestination(other.to_string())),
        },
    }
}

pub fn parse_subscribe(destination: &str) -> Result<SubscribeTarget, BrokerError> {
    match destination {
        MESSAGES => Ok(SubscribeTarget::Topic(Topic::Messages)),
        USERS | USERS_TOPIC => Ok(SubscribeTarget::Topic(Topic::Users)),
        PRIVATE_QUEUE => Ok(SubscribeTarget::PrivateQueue),
        other => Err(BrokerError::UnknownDestination(other.to_string())),
    }
}

/// Destination an outbound frame is delivered on. User lists go out on
/// whichever name the client subscribed with.
pub fn outbound<'a>(frame: &Outbound, users_destination: &'a str) -> &'a str {
    match frame {
        Outbound::Chat(_) => MESSAGES,
        Outbound::Private(_) => PRIVATE_QUEUE,
        Outbound::Users(_) => users_destination,
    }
}
