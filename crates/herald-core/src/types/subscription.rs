//! Subscription and Channel types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::notification::NotificationCategory;
use crate::error::{HeraldError, Result};

/// Reserved slug of the subscription that receives escalations.
pub const ESCALATION_SUBSCRIPTION_SLUG: &str = "ESCALATION";

/// HTTP verb used by a REST channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// Discriminant of [`Channel`], used as the key of the deliverer map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChannelKind {
    Email,
    Rest,
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelKind::Email => f.write_str("EMAIL"),
            ChannelKind::Rest => f.write_str("REST"),
        }
    }
}

/// A delivery mechanism and its address.
///
/// Fields are defaulted on deserialization so that an incomplete channel
/// can be stored and then rejected by [`Channel::validate`] at send time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum Channel {
    Email {
        #[serde(default, rename = "mailAddresses")]
        mail_addresses: Vec<String>,
    },
    Rest {
        #[serde(default)]
        url: String,
        #[serde(default, rename = "httpMethod")]
        http_method: Option<HttpMethod>,
    },
}

impl Channel {
    pub fn email<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Channel::Email {
            mail_addresses: addresses.into_iter().map(Into::into).collect(),
        }
    }

    pub fn rest(url: impl Into<String>, method: HttpMethod) -> Self {
        Channel::Rest {
            url: url.into(),
            http_method: Some(method),
        }
    }

    pub fn kind(&self) -> ChannelKind {
        match self {
            Channel::Email { .. } => ChannelKind::Email,
            Channel::Rest { .. } => ChannelKind::Rest,
        }
    }

    /// A channel must carry every sub-field its kind needs.
    pub fn validate(&self) -> Result<()> {
        match self {
            Channel::Email { mail_addresses } => {
                if mail_addresses.is_empty() {
                    return Err(HeraldError::validation("EMAIL channel has no mail addresses"));
                }
                if mail_addresses.iter().any(|a| a.trim().is_empty()) {
                    return Err(HeraldError::validation("EMAIL channel has a blank mail address"));
                }
            }
            Channel::Rest { url, http_method } => {
                if url.trim().is_empty() {
                    return Err(HeraldError::validation("REST channel has no url"));
                }
                if http_method.is_none() {
                    return Err(HeraldError::validation(format!(
                        "REST channel {url} has no http method"
                    )));
                }
            }
        }
        Ok(())
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::Email { mail_addresses } => {
                write!(f, "EMAIL[{}]", mail_addresses.join(","))
            }
            Channel::Rest { url, http_method } => write!(
                f,
                "REST[{} {}]",
                http_method.map(|m| m.as_str()).unwrap_or("?"),
                url
            ),
        }
    }
}

/// A standing registration of interest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    #[serde(default)]
    pub id: String,
    pub slug: String,
    pub receiver: String,
    #[serde(default)]
    pub subscribed_categories: Vec<NotificationCategory>,
    #[serde(default)]
    pub subscribed_labels: Vec<String>,
    #[serde(default)]
    pub channels: Vec<Channel>,
    #[serde(default = "Utc::now")]
    pub created: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub modified: DateTime<Utc>,
}

impl Subscription {
    pub fn new(slug: impl Into<String>, receiver: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            slug: slug.into(),
            receiver: receiver.into(),
            subscribed_categories: Vec::new(),
            subscribed_labels: Vec::new(),
            channels: Vec::new(),
            created: now,
            modified: now,
        }
    }

    pub fn with_categories(mut self, categories: impl IntoIterator<Item = NotificationCategory>) -> Self {
        self.subscribed_categories = categories.into_iter().collect();
        self
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subscribed_labels = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_channel(mut self, channel: Channel) -> Self {
        self.channels.push(channel);
        self
    }

    /// True when any category or any label overlaps. Labels compare
    /// case-insensitively; empty inputs never match.
    pub fn matches(&self, categories: &[NotificationCategory], labels: &[String]) -> bool {
        let by_category = categories
            .iter()
            .any(|c| self.subscribed_categories.contains(c));
        let by_label = labels.iter().any(|l| {
            self.subscribed_labels
                .iter()
                .any(|s| s.eq_ignore_ascii_case(l))
        });
        by_category || by_label
    }

    pub fn is_escalation(&self) -> bool {
        self.slug.eq_ignore_ascii_case(ESCALATION_SUBSCRIPTION_SLUG)
    }

    /// Administrative validation: identity, receiver and at least one channel.
    /// Channel completeness is checked per send.
    pub fn validate(&self) -> Result<()> {
        if self.slug.trim().is_empty() {
            return Err(HeraldError::validation("subscription slug is empty"));
        }
        if self.receiver.trim().is_empty() {
            return Err(HeraldError::validation(format!(
                "subscription {} has no receiver",
                self.slug
            )));
        }
        if self.channels.is_empty() {
            return Err(HeraldError::validation(format!(
                "subscription {} has no channels",
                self.slug
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_wire_format() {
        let json = r#"[
            {"type": "EMAIL", "mailAddresses": ["ops@example.com"]},
            {"type": "REST", "url": "http://hooks.local/n", "httpMethod": "POST"}
        ]"#;
        let channels: Vec<Channel> = serde_json::from_str(json).unwrap();
        assert_eq!(channels[0], Channel::email(["ops@example.com"]));
        assert_eq!(channels[1], Channel::rest("http://hooks.local/n", HttpMethod::Post));
        assert_eq!(channels[1].kind(), ChannelKind::Rest);
    }

    #[test]
    fn test_incomplete_channels_rejected() {
        assert!(Channel::email(Vec::<String>::new()).validate().is_err());
        assert!(Channel::rest("", HttpMethod::Get).validate().is_err());
        let no_method: Channel = serde_json::from_str(r#"{"type":"REST","url":"http://x"}"#).unwrap();
        assert!(matches!(no_method.validate(), Err(HeraldError::Validation(_))));
        assert!(Channel::email(["a@b.c"]).validate().is_ok());
    }

    #[test]
    fn test_blank_address_beside_real_one_rejected() {
        let mixed = Channel::email(["", "a@x.com"]);
        assert!(matches!(mixed.validate(), Err(HeraldError::Validation(_))));
        assert!(Channel::email(["a@x.com", "  "]).validate().is_err());
    }

    #[test]
    fn test_matches_category_or_label() {
        let sub = Subscription::new("ops", "ops-team")
            .with_categories([NotificationCategory::SwHealth])
            .with_labels(["Rack-3"]);
        assert!(sub.matches(&[NotificationCategory::SwHealth], &[]));
        assert!(sub.matches(&[], &["rack-3".to_string()]));
        assert!(!sub.matches(&[NotificationCategory::Security], &["x".to_string()]));
    }

    #[test]
    fn test_empty_sets_never_match() {
        let sub = Subscription::new("all", "r")
            .with_categories([NotificationCategory::Security])
            .with_labels(["y"]);
        assert!(!sub.matches(&[], &[]));
    }

    #[test]
    fn test_subscription_requires_channels() {
        let sub = Subscription::new("s", "r");
        assert!(sub.validate().is_err());
        assert!(sub.with_channel(Channel::email(["a@b.c"])).validate().is_ok());
    }
}
