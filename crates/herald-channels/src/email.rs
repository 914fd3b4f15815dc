//! Email channel: async SMTP relay (lettre) and the EMAIL delivery strategy.

use std::sync::Arc;

use async_trait::async_trait;
use herald_core::config::MailConfig;
use herald_core::error::{HeraldError, Result};
use herald_core::traits::{Deliverer, Mailer, OutgoingMail};
use herald_core::types::{Channel, ChannelKind, Notification, TransmissionRecord};
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message as LettreMessage, Tokio1Executor,
    message::Mailbox, message::header::ContentType,
    transport::smtp::authentication::Credentials,
};

/// SMTP relay over lettre's tokio transport.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    /// Build the relay transport once; connections are pooled by lettre.
    pub fn new(config: &MailConfig) -> Result<Self> {
        let builder = if config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
                .map_err(|e| HeraldError::Channel(format!("SMTP relay: {e}")))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
        };

        let mut builder = builder
            .port(config.smtp_port)
            .timeout(Some(config.timeout()));
        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }

        tracing::info!(
            "📧 SMTP relay: {}:{} (starttls={})",
            config.smtp_host,
            config.smtp_port,
            config.starttls
        );
        Ok(Self {
            transport: builder.build(),
        })
    }
}

/// Assemble a plain-text message with one `To` per address.
fn build_message(mail: &OutgoingMail) -> Result<LettreMessage> {
    let from: Mailbox = mail
        .from
        .parse()
        .map_err(|e| HeraldError::Channel(format!("Invalid from: {e}")))?;

    let mut builder = LettreMessage::builder()
        .from(from)
        .subject(mail.subject.as_str())
        .header(ContentType::TEXT_PLAIN);
    for address in &mail.to {
        let to: Mailbox = address
            .parse()
            .map_err(|e| HeraldError::Channel(format!("Invalid to '{address}': {e}")))?;
        builder = builder.to(to);
    }

    builder
        .body(mail.body.clone())
        .map_err(|e| HeraldError::Channel(format!("Build email: {e}")))
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_mail(&self, mail: &OutgoingMail) -> Result<String> {
        let message = build_message(mail)?;
        let response = self
            .transport
            .send(message)
            .await
            .map_err(|e| HeraldError::Channel(format!("SMTP send: {e}")))?;
        Ok(format!("SMTP server received ({})", response.code()))
    }
}

/// EMAIL strategy: configured sender and subject, body = notification content.
pub struct EmailDeliverer {
    mailer: Arc<dyn Mailer>,
    from: String,
    subject: String,
}

impl EmailDeliverer {
    pub fn new(mailer: Arc<dyn Mailer>, from: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            mailer,
            from: from.into(),
            subject: subject.into(),
        }
    }

    pub fn from_config(mailer: Arc<dyn Mailer>, config: &MailConfig) -> Self {
        Self::new(mailer, config.sender.clone(), config.subject.clone())
    }
}

#[async_trait]
impl Deliverer for EmailDeliverer {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Email
    }

    async fn deliver(&self, notification: &Notification, channel: &Channel) -> TransmissionRecord {
        let Channel::Email { mail_addresses } = channel else {
            return TransmissionRecord::failed(format!("EMAIL strategy cannot deliver over {channel}"));
        };

        let mail = OutgoingMail {
            from: self.from.clone(),
            subject: self.subject.clone(),
            to: mail_addresses.clone(),
            body: notification.content.clone(),
        };

        match self.mailer.send_mail(&mail).await {
            Ok(diagnostic) => {
                tracing::info!("📤 Email sent for '{}' to {}", notification.slug, mail.to.join(", "));
                TransmissionRecord::sent(diagnostic)
            }
            Err(e) => {
                tracing::warn!("⚠️ Email for '{}' failed: {e}", notification.slug);
                TransmissionRecord::failed(e.to_string())
            }
        }
    }
}
