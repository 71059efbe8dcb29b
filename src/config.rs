use std::str::FromStr;
use std::time::Duration;

use crate::broker::BrokerSettings;
use crate::gateway::heartbeat::{DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_HEARTBEAT_TIMEOUT};

#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    /// Interval advertised to clients in HELLO.
    pub interval: Duration,
    /// Idle time after which the server drops a session.
    pub timeout: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_HEARTBEAT_INTERVAL,
            timeout: DEFAULT_HEARTBEAT_TIMEOUT,
        }
    }
}

/// Per-connection limits enforced by the websocket gateway.
#[derive(Debug, Clone)]
pub struct GatewayLimits {
    pub max_frame_bytes: usize,
    /// Frames allowed per rate window.
    pub rate_limit: u32,
    /// Burst allowance on top of `rate_limit`.
    pub rate_burst: u32,
}

impl Default for GatewayLimits {
    fn default() -> Self {
        Self {
            max_frame_bytes: 64 * 1024,
            rate_limit: 120,
            rate_burst: 30,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub bind: String,
    pub broker: BrokerSettings,
    pub heartbeat: HeartbeatConfig,
    pub limits: GatewayLimits,
}

impl Config {
    pub fn from_env() -> Self {
        let broker_defaults = BrokerSettings::default();
        let limit_defaults = GatewayLimits::default();

        let heartbeat_interval = env_positive("CHAT_HEARTBEAT_INTERVAL_SECS")
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_HEARTBEAT_INTERVAL);
        let heartbeat_timeout = env_positive("CHAT_HEARTBEAT_TIMEOUT_SECS")
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_HEARTBEAT_TIMEOUT);

        Self {
            port: env_parse("PORT").unwrap_or(8080),
            bind: std::env::var("CHAT_BIND")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| "0.0.0.0".to_string()),
            broker: BrokerSettings {
                outbound_queue: env_positive("CHAT_OUTBOUND_QUEUE")
                    .unwrap_or(broker_defaults.outbound_queue),
                max_content_len: env_positive("CHAT_MAX_CONTENT_LEN")
                    .unwrap_or(broker_defaults.max_content_len),
            },
            heartbeat: HeartbeatConfig {
                interval: heartbeat_interval,
                timeout: heartbeat_timeout.max(heartbeat_interval),
            },
            limits: GatewayLimits {
                max_frame_bytes: env_positive("CHAT_MAX_FRAME_BYTES")
                    .unwrap_or(limit_defaults.max_frame_bytes),
                rate_limit: env_positive("CHAT_RATE_LIMIT").unwrap_or(limit_defaults.rate_limit),
                rate_burst: env_parse("CHAT_RATE_BURST").unwrap_or(limit_defaults.rate_burst),
            },
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Zero would break queues and timers, so it counts as unset.
fn env_positive<T: FromStr + PartialOrd + Default>(key: &str) -> Option<T> {
    env_parse(key).filter(|v: &T| *v > T::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for key in [
            "PORT",
            "CHAT_BIND",
            "CHAT_OUTBOUND_QUEUE",
            "CHAT_MAX_CONTENT_LEN",
            "CHAT_HEARTBEAT_INTERVAL_SECS",
            "CHAT_HEARTBEAT_TIMEOUT_SECS",
            "CHAT_MAX_FRAME_BYTES",
            "CHAT_RATE_LIMIT",
            "CHAT_RATE_BURST",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_default_config() {
        clear_env();
        let config = Config::from_env();
        assert_eq!(config.port, 8080);
        assert_eq!(config.bind, "0.0.0.0");
        assert_eq!(config.broker.outbound_queue, 256);
        assert_eq!(config.broker.max_content_len, 4000);
        assert_eq!(config.heartbeat.interval, Duration::from_secs(45));
        assert_eq!(config.heartbeat.timeout, Duration::from_secs(90));
        assert_eq!(config.limits.rate_limit, 120);
        assert_eq!(config.limits.rate_burst, 30);
    }

    #[test]
    #[serial]
    fn test_port_from_env() {
        clear_env();
        std::env::set_var("PORT", "9000");
        assert_eq!(Config::from_env().port, 9000);
    }

    #[test]
    #[serial]
    fn test_invalid_port_falls_back_to_default() {
        clear_env();
        std::env::set_var("PORT", "not_a_number");
        assert_eq!(Config::from_env().port, 8080);
    }

    #[test]
    #[serial]
    fn test_zero_queue_falls_back_to_default() {
        clear_env();
        std::env::set_var("CHAT_OUTBOUND_QUEUE", "0");
        assert_eq!(Config::from_env().broker.outbound_queue, 256);
    }

    #[test]
    #[serial]
    fn test_limits_from_env() {
        clear_env();
        std::env::set_var("CHAT_OUTBOUND_QUEUE", "16");
        std::env::set_var("CHAT_MAX_CONTENT_LEN", "280");
        std::env::set_var("CHAT_MAX_FRAME_BYTES", "1024");
        std::env::set_var("CHAT_RATE_LIMIT", "10");
        std::env::set_var("CHAT_RATE_BURST", "0");
        let config = Config::from_env();
        assert_eq!(config.broker.outbound_queue, 16);
        assert_eq!(config.broker.max_content_len, 280);
        assert_eq!(config.limits.max_frame_bytes, 1024);
        assert_eq!(config.limits.rate_limit, 10);
        assert_eq!(config.limits.rate_burst, 0);
    }

    #[test]
    #[serial]
    fn test_timeout_never_shorter_than_interval() {
        clear_env();
        std::env::set_var("CHAT_HEARTBEAT_INTERVAL_SECS", "30");
        std::env::set_var("CHAT_HEARTBEAT_TIMEOUT_SECS", "5");
        let config = Config::from_env();
        assert_eq!(config.heartbeat.interval, Duration::from_secs(30));
        assert_eq!(config.heartbeat.timeout, Duration::from_secs(30));
    }

    #[test]
    #[serial]
    fn test_blank_bind_uses_default() {
        clear_env();
        std::env::set_var("CHAT_BIND", "  ");
        assert_eq!(Config::from_env().bind, "0.0.0.0");
    }
}
