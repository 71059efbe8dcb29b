use std::sync::Arc;

use crate::broker::Broker;
use crate::config::{Config, GatewayLimits, HeartbeatConfig};

#[derive(Clone)]
pub struct AppState {
    pub broker: Arc<Broker>,
    pub heartbeat: HeartbeatConfig,
    pub limits: GatewayLimits,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        Self {
            broker: Arc::new(Broker::new(config.broker.clone())),
            heartbeat: config.heartbeat.clone(),
            limits: config.limits.clone(),
        }
    }
}
