use std::time::Duration;

use async_trait::async_trait;

use herald_common::error::DeliveryError;
use herald_common::types::ChannelType;

use super::DeliveryGateway;

/// Gateway that only logs the delivery and reports success.
///
/// Used for channels with no relay configured, and in local development.
#[derive(Debug, Clone, Default)]
pub struct LogGateway {
    latency: Option<Duration>,
}

impl LogGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait `latency` before each send completes.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
        }
    }
}

#[async_trait]
impl DeliveryGateway for LogGateway {
    async fn send(
        &self,
        recipient: &str,
        message: &str,
        channel: ChannelType,
    ) -> Result<(), DeliveryError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        tracing::info!(
            channel = %channel,
            recipient = %recipient,
            message_len = message.len(),
            "Delivered notification (log only)"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
