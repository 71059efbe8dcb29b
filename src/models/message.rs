use serde::{Deserialize, Serialize};

use crate::error::BrokerError;

pub const MAX_NICKNAME_LEN: usize = 32;

/// A chat message as delivered to subscribers.
///
/// `nickname` is always the sender's bound nickname, never what the client
/// claimed in its payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub nickname: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
}

impl ChatMessage {
    pub fn public(nickname: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            nickname: nickname.into(),
            content: content.into(),
            recipient: None,
        }
    }

    pub fn private(
        nickname: impl Into<String>,
        recipient: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            nickname: nickname.into(),
            content: content.into(),
            recipient: Some(recipient.into()),
        }
    }
}

/// `enter` payload.
#[derive(Debug, Deserialize)]
pub struct EnterRequest {
    pub nickname: String,
}

/// `chat` and `private/{recipient}` payload.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub nickname: Option<String>,
    pub content: String,
    #[serde(default)]
    pub recipient: Option<String>,
}

/// Trim and check a nickname supplied by a client.
pub fn normalize_nickname(raw: &str) -> Result<String, BrokerError> {
    let nickname = raw.trim();
    if nickname.is_empty() {
        return Err(BrokerError::InvalidNickname("nickname is empty".into()));
    }
    if nickname.chars().count() > MAX_NICKNAME_LEN {
        return Err(BrokerError::InvalidNickname(format!(
            "nickname is longer than {MAX_NICKNAME_LEN} characters"
        )));
    }
    if nickname.chars().any(|c| c.is_control() || c == '/') {
        return Err(BrokerError::InvalidNickname(
            "nickname contains a control character or '/'".into(),
        ));
    }
    Ok(nickname.to_string())
}

/// Reject blank or oversized content. Content is passed through untrimmed.
pub fn validate_content(content: &str, max_len: usize) -> Result<(), BrokerError> {
    if content.trim().is_empty() {
        return Err(BrokerError::InvalidContent("content is blank".into()));
    }
    if content.chars().count() > max_len {
        return Err(BrokerError::InvalidContent(format!(
            "content is longer than {max_len} characters"
        )));
    }
    Ok(())
}
