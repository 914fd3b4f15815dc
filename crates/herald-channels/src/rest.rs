//! REST channel: reqwest HTTP exchange and the REST delivery strategy.

use std::sync::Arc;

use async_trait::async_trait;
use herald_core::config::RestConfig;
use herald_core::error::{HeraldError, Result};
use herald_core::traits::{Deliverer, HttpExchange, OutgoingRequest};
use herald_core::types::{Channel, ChannelKind, HttpMethod, Notification, TransmissionRecord};

/// Content type used when the notification does not carry one.
pub const DEFAULT_CONTENT_TYPE: &str = "text/plain";

/// HTTP exchange over a shared reqwest client.
pub struct ReqwestExchange {
    client: reqwest::Client,
}

impl ReqwestExchange {
    pub fn new(config: &RestConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("Herald/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout())
            .build()
            .map_err(|e| HeraldError::Channel(format!("Client error: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpExchange for ReqwestExchange {
    async fn exchange(&self, request: &OutgoingRequest) -> Result<String> {
        let builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
            HttpMethod::Put => self.client.put(&request.url),
            HttpMethod::Patch => self.client.patch(&request.url),
            HttpMethod::Delete => self.client.delete(&request.url),
        };

        let response = builder
            .header(reqwest::header::CONTENT_TYPE, request.content_type.as_str())
            .body(request.body.clone())
            .send()
            .await
            .map_err(|e| HeraldError::Channel(format!("Request failed: {e}")))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if status.is_success() {
            Ok(body)
        } else {
            Err(HeraldError::Channel(format!("HTTP {status}: {body}")))
        }
    }
}

/// REST strategy: one request with the channel's method and URL.
pub struct RestDeliverer {
    exchange: Arc<dyn HttpExchange>,
}

impl RestDeliverer {
    pub fn new(exchange: Arc<dyn HttpExchange>) -> Self {
        Self { exchange }
    }
}

#[async_trait]
impl Deliverer for RestDeliverer {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Rest
    }

    async fn deliver(&self, notification: &Notification, channel: &Channel) -> TransmissionRecord {
        let (url, method) = match channel {
            Channel::Rest { url, http_method: Some(method) } => (url.clone(), *method),
            other => {
                return TransmissionRecord::failed(format!("REST strategy cannot deliver over {other}"));
            }
        };

        let request = OutgoingRequest {
            method,
            url,
            content_type: notification
                .content_type
                .clone()
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
            body: notification.content.clone(),
        };

        match self.exchange.exchange(&request).await {
            Ok(body) => {
                tracing::info!(
                    "🌐 REST {} {} delivered '{}'",
                    method.as_str(),
                    request.url,
                    notification.slug
                );
                TransmissionRecord::sent(body)
            }
            Err(e) => {
                tracing::warn!("⚠️ REST delivery of '{}' failed: {e}", notification.slug);
                TransmissionRecord::failed(e.to_string())
            }
        }
    }
}
