//! Transport seams: the raw outbound calls and the per-kind delivery strategy.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Channel, ChannelKind, HttpMethod, Notification, TransmissionRecord};

/// One outbound mail message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub from: String,
    pub subject: String,
    pub to: Vec<String>,
    pub body: String,
}

/// Mail relay. Returns a diagnostic string on acceptance.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_mail(&self, mail: &OutgoingMail) -> Result<String>;
}

/// One outbound HTTP call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingRequest {
    pub method: HttpMethod,
    pub url: String,
    pub content_type: String,
    pub body: String,
}

/// HTTP client. `Err` for transport failures and non-2xx responses.
#[async_trait]
pub trait HttpExchange: Send + Sync {
    async fn exchange(&self, request: &OutgoingRequest) -> Result<String>;
}

/// Delivery strategy for one channel kind.
///
/// Performs exactly one attempt and classifies it. Transport errors become
/// a `FAILED` record rather than an `Err`.
#[async_trait]
pub trait Deliverer: Send + Sync {
    fn kind(&self) -> ChannelKind;

    async fn deliver(&self, notification: &Notification, channel: &Channel) -> TransmissionRecord;
}
