//! Delivery gateways.
//!
//! A gateway sends one message to one recipient over one channel. The worker
//! talks to a single `DeliveryGateway`, normally a `ChannelRouter` that picks
//! the concrete gateway by channel type.

pub mod http;
pub mod simulated;

pub use self::http::HttpRelayGateway;
pub use self::simulated::LogGateway;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use herald_common::error::DeliveryError;
use herald_common::types::ChannelType;

/// Sends a message over a delivery channel.
///
/// Implementations own their timeouts; the worker never imposes one.
#[async_trait]
pub trait DeliveryGateway: Send + Sync {
    async fn send(
        &self,
        recipient: &str,
        message: &str,
        channel: ChannelType,
    ) -> Result<(), DeliveryError>;

    /// Human-readable name for logs (e.g., "http-relay").
    fn name(&self) -> &'static str;
}

/// Dispatches each send to the gateway registered for its channel type.
#[derive(Default, Clone)]
pub struct ChannelRouter {
    routes: HashMap<ChannelType, Arc<dyn DeliveryGateway>>,
}

impl ChannelRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `gateway` for `channel`, replacing any earlier route.
    pub fn route(mut self, channel: ChannelType, gateway: Arc<dyn DeliveryGateway>) -> Self {
        self.register(channel, gateway);
        self
    }

    pub fn register(&mut self, channel: ChannelType, gateway: Arc<dyn DeliveryGateway>) {
        if let Some(previous) = self.routes.insert(channel, Arc::clone(&gateway)) {
            tracing::debug!(
                channel = %channel,
                previous = previous.name(),
                gateway = gateway.name(),
                "Replaced delivery route"
            );
        }
    }
}

#[async_trait]
impl DeliveryGateway for ChannelRouter {
    async fn send(
        &self,
        recipient: &str,
        message: &str,
        channel: ChannelType,
    ) -> Result<(), DeliveryError> {
        let gateway = self
            .routes
            .get(&channel)
            .ok_or(DeliveryError::UnsupportedChannel(channel))?;

        tracing::debug!(channel = %channel, gateway = gateway.name(), "Routing delivery");
        gateway.send(recipient, message, channel).await
    }

    fn name(&self) -> &'static str {
        "channel-router"
    }
}
