//! Relay gateway that forwards each delivery to an HTTP endpoint as JSON.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;

use herald_common::error::DeliveryError;
use herald_common::types::ChannelType;

use super::DeliveryGateway;

#[derive(Debug, Serialize)]
struct RelayRequest<'a> {
    recipient: &'a str,
    message: &'a str,
    channel: ChannelType,
}

/// POSTs `{recipient, message, channel}` to a relay service.
///
/// Any 2xx answer counts as delivered. The request timeout is enforced here.
#[derive(Debug, Clone)]
pub struct HttpRelayGateway {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpRelayGateway {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            timeout,
        })
    }

    fn transport_error(&self, err: reqwest::Error) -> DeliveryError {
        if err.is_timeout() {
            DeliveryError::Timeout(self.timeout)
        } else {
            DeliveryError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl DeliveryGateway for HttpRelayGateway {
    async fn send(
        &self,
        recipient: &str,
        message: &str,
        channel: ChannelType,
    ) -> Result<(), DeliveryError> {
        let body = RelayRequest {
            recipient,
            message,
            channel,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(endpoint = %self.endpoint, status = status.as_u16(), "Relay accepted delivery");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(DeliveryError::Rejected {
            status: status.as_u16(),
            body,
        })
    }

    fn name(&self) -> &'static str {
        "http-relay"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn relay_url(server: &MockServer) -> String {
        format!("{}/deliver", server.uri())
    }

    #[tokio::test]
    async fn test_success_posts_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/deliver"))
            .and(header("content-type", "application/json"))
            .and(body_json(serde_json::json!({
                "recipient": "ana@example.com",
                "message": "Your order shipped",
                "channel": "email"
            })))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let gateway = HttpRelayGateway::new(relay_url(&server), Duration::from_secs(5)).unwrap();
        gateway
            .send("ana@example.com", "Your order shipped", ChannelType::Email)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_non_success_status_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/deliver"))
            .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
            .mount(&server)
            .await;

        let gateway = HttpRelayGateway::new(relay_url(&server), Duration::from_secs(5)).unwrap();
        let err = gateway
            .send("+33600000000", "hi", ChannelType::Sms)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            DeliveryError::Rejected {
                status: 503,
                body: "busy".into()
            }
        );
    }

    #[tokio::test]
    async fn test_slow_relay_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let timeout = Duration::from_millis(200);
        let gateway = HttpRelayGateway::new(relay_url(&server), timeout).unwrap();
        let err = gateway
            .send("token", "hi", ChannelType::Push)
            .await
            .unwrap_err();
        assert_eq!(err, DeliveryError::Timeout(timeout));
    }

    #[tokio::test]
    async fn test_unreachable_relay_is_a_transport_error() {
        // Bind then drop to get a port nobody listens on.
        let addr = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap();
        let gateway =
            HttpRelayGateway::new(format!("http://{addr}/deliver"), Duration::from_secs(2)).unwrap();

        let err = gateway
            .send("token", "hi", ChannelType::Push)
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::Transport(_)));
    }
}
