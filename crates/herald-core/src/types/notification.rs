//! Notification: a message to distribute to interested subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{HeraldError, Result};

/// Notification category, matched against subscribed categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationCategory {
    Security,
    HwHealth,
    SwHealth,
}

impl NotificationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationCategory::Security => "SECURITY",
            NotificationCategory::HwHealth => "HW_HEALTH",
            NotificationCategory::SwHealth => "SW_HEALTH",
        }
    }

    /// Case-insensitive parse.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "SECURITY" => Some(NotificationCategory::Security),
            "HW_HEALTH" => Some(NotificationCategory::HwHealth),
            "SW_HEALTH" => Some(NotificationCategory::SwHealth),
            _ => None,
        }
    }
}

impl std::fmt::Display for NotificationCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity decides the retry path: critical retries on a timer and
/// escalates, normal waits for the periodic sweeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationSeverity {
    Critical,
    Normal,
}

impl NotificationSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationSeverity::Critical => "CRITICAL",
            NotificationSeverity::Normal => "NORMAL",
        }
    }
}

/// `NEW` moves to exactly one terminal status and never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationStatus {
    New,
    Processed,
    Escalated,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::New => "NEW",
            NotificationStatus::Processed => "PROCESSED",
            NotificationStatus::Escalated => "ESCALATED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, NotificationStatus::New)
    }
}

/// A message to distribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Assigned by the store on insert.
    #[serde(default)]
    pub id: String,
    pub slug: String,
    pub sender: String,
    #[serde(default)]
    pub category: Option<NotificationCategory>,
    pub severity: NotificationSeverity,
    pub content: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub labels: Option<Vec<String>>,
    /// MIME type for REST delivery; `text/plain` when absent.
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default = "default_status")]
    pub status: NotificationStatus,
    #[serde(default = "Utc::now")]
    pub created: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub modified: DateTime<Utc>,
}

fn default_status() -> NotificationStatus {
    NotificationStatus::New
}

impl Notification {
    pub fn new(
        slug: impl Into<String>,
        sender: impl Into<String>,
        severity: NotificationSeverity,
        content: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            slug: slug.into(),
            sender: sender.into(),
            category: None,
            severity,
            content: content.into(),
            description: None,
            labels: None,
            content_type: None,
            status: NotificationStatus::New,
            created: now,
            modified: now,
        }
    }

    pub fn with_category(mut self, category: NotificationCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = Some(labels.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn is_critical(&self) -> bool {
        self.severity == NotificationSeverity::Critical
    }

    /// Category as a (possibly empty) match set.
    pub fn category_set(&self) -> Vec<NotificationCategory> {
        self.category.into_iter().collect()
    }

    /// Labels as a (possibly empty) match set.
    pub fn label_set(&self) -> Vec<String> {
        self.labels.clone().unwrap_or_default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.slug.trim().is_empty() {
            return Err(HeraldError::validation("notification slug is empty"));
        }
        if self.sender.trim().is_empty() {
            return Err(HeraldError::validation(format!(
                "notification {} has no sender",
                self.slug
            )));
        }
        Ok(())
    }

    /// Status transitions only leave `NEW`.
    pub fn transition(&mut self, status: NotificationStatus) -> Result<()> {
        if self.status == status {
            return Ok(());
        }
        if self.status.is_terminal() {
            return Err(HeraldError::validation(format!(
                "notification {} is already {}",
                self.slug,
                self.status.as_str()
            )));
        }
        self.status = status;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_is_monotonic() {
        let mut n = Notification::new("disk-full", "monitor", NotificationSeverity::Normal, "95%");
        n.transition(NotificationStatus::Processed).unwrap();
        assert!(n.transition(NotificationStatus::New).is_err());
        assert!(n.transition(NotificationStatus::Escalated).is_err());
        assert_eq!(n.status, NotificationStatus::Processed);
    }

    #[test]
    fn test_absent_fields_give_empty_match_sets() {
        let n = Notification::new("x", "s", NotificationSeverity::Normal, "c");
        assert!(n.category_set().is_empty());
        assert!(n.label_set().is_empty());
    }

    #[test]
    fn test_wire_format() {
        let json = r#"{
            "slug": "temp-high",
            "sender": "sensor-7",
            "category": "HW_HEALTH",
            "severity": "CRITICAL",
            "content": "temperature above threshold",
            "labels": ["rack-3"]
        }"#;
        let n: Notification = serde_json::from_str(json).unwrap();
        assert_eq!(n.category, Some(NotificationCategory::HwHealth));
        assert_eq!(n.status, NotificationStatus::New);
        assert!(n.is_critical());
        assert_eq!(n.label_set(), vec!["rack-3".to_string()]);
    }

    #[test]
    fn test_validate_requires_slug() {
        let n = Notification::new("  ", "s", NotificationSeverity::Normal, "c");
        assert!(matches!(n.validate(), Err(HeraldError::Validation(_))));
    }

    #[test]
    fn test_category_parse_ignores_case() {
        assert_eq!(NotificationCategory::parse("sw_health"), Some(NotificationCategory::SwHealth));
        assert_eq!(NotificationCategory::parse("unknown"), None);
    }
}
