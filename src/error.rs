use thiserror::Error;

/// Everything that can go wrong while routing a single session's frames.
///
/// None of these are fatal to the broker. The transport logs them and keeps
/// the session alive unless the variant is [`BrokerError::Transport`].
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("transport failed: {0}")]
    Transport(String),
    #[error("frame for {destination} received before enter")]
    UnboundFrame { destination: String },
    #[error("no active user named {0:?}")]
    UnknownRecipient(String),
    #[error("malformed frame: {0}")]
    MalformedFrame(String),
    #[error("unknown destination {0:?}")]
    UnknownDestination(String),
    #[error("invalid nickname: {0}")]
    InvalidNickname(String),
    #[error("invalid content: {0}")]
    InvalidContent(String),
    #[error("rate limited")]
    RateLimited,
    #[error("session is closed")]
    SessionClosed,
}

impl BrokerError {
    pub fn code(&self) -> &'static str {
        match self {
            BrokerError::Transport(_) => "transport_error",
            BrokerError::UnboundFrame { .. } => "unbound_frame",
            BrokerError::UnknownRecipient(_) => "unknown_recipient",
            BrokerError::MalformedFrame(_) => "malformed_frame",
            BrokerError::UnknownDestination(_) => "unknown_destination",
            BrokerError::InvalidNickname(_) => "invalid_nickname",
            BrokerError::InvalidContent(_) => "invalid_content",
            BrokerError::RateLimited => "rate_limited",
            BrokerError::SessionClosed => "session_closed",
        }
    }

    /// Errors that are expected in normal traffic and only worth a debug line.
    pub fn is_routine(&self) -> bool {
        matches!(
            self,
            BrokerError::UnknownRecipient(_)
                | BrokerError::SessionClosed
                | BrokerError::RateLimited
        )
    }
}

impl From<serde_json::Error> for BrokerError {
    fn from(e: serde_json::Error) -> Self {
        BrokerError::MalformedFrame(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_errors_become_malformed_frames() {
        let err = serde_json::from_str::<serde_json::Value>("{nope").unwrap_err();
        let err = BrokerError::from(err);
        assert_eq!(err.code(), "malformed_frame");
    }

    #[test]
    fn test_unbound_frame_message_names_destination() {
        let err = BrokerError::UnboundFrame {
            destination: "chat".to_string(),
        };
        assert_eq!(err.to_string(), "frame for chat received before enter");
        assert!(!err.is_routine());
    }

    #[test]
    fn test_unknown_recipient_is_routine() {
        assert!(BrokerError::UnknownRecipient("bob".into()).is_routine());
    }
}
