use serde::{Deserialize, Serialize};

/// Opcodes for gateway messages.
pub mod opcode {
    pub const MESSAGE: u8 = 0;
    pub const HEARTBEAT: u8 = 1;
    pub const SEND: u8 = 2;
    pub const SUBSCRIBE: u8 = 3;
    pub const HEARTBEAT_ACK: u8 = 4;
    pub const HELLO: u8 = 5;
    pub const UNSUBSCRIBE: u8 = 6;
    pub const INVALID_SESSION: u8 = 7;
}

/// Close codes.
pub mod close_code {
    pub const SESSION_REPLACED: u16 = 4005;
    pub const SESSION_TIMED_OUT: u16 = 4009;
}

/// Gateway message envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayMessage {
    pub op: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl GatewayMessage {
    pub fn op(op: u8) -> Self {
        Self {
            op,
            seq: None,
            destination: None,
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn to_json(&self) -> String {
        // A struct of plain fields and a Value cannot fail to serialize.
        serde_json::to_string(self).unwrap_or_default()
    }
}
