//! Transmission: the ledger entry for one notification delivered to one
//! receiver over one channel, across the initial send and every resend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::notification::Notification;
use super::subscription::Channel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransmissionStatus {
    Sent,
    Failed,
    Acknowledged,
    Escalated,
}

impl TransmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransmissionStatus::Sent => "SENT",
            TransmissionStatus::Failed => "FAILED",
            TransmissionStatus::Acknowledged => "ACKNOWLEDGED",
            TransmissionStatus::Escalated => "ESCALATED",
        }
    }

    /// Case-insensitive parse.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "SENT" => Some(TransmissionStatus::Sent),
            "FAILED" => Some(TransmissionStatus::Failed),
            "ACKNOWLEDGED" => Some(TransmissionStatus::Acknowledged),
            "ESCALATED" => Some(TransmissionStatus::Escalated),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransmissionRecord {
    pub status: TransmissionStatus,
    /// Transport response, or the failure diagnostic.
    pub response: String,
    pub sent: DateTime<Utc>,
}

impl TransmissionRecord {
    pub fn sent(response: impl Into<String>) -> Self {
        Self {
            status: TransmissionStatus::Sent,
            response: response.into(),
            sent: Utc::now(),
        }
    }

    pub fn failed(response: impl Into<String>) -> Self {
        Self {
            status: TransmissionStatus::Failed,
            response: response.into(),
            sent: Utc::now(),
        }
    }
}

/// Invariant: `records.len() == 1 + resend_count`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transmission {
    #[serde(default)]
    pub id: String,
    pub notification: Notification,
    pub receiver: String,
    pub channel: Channel,
    pub resend_count: u32,
    pub status: TransmissionStatus,
    pub records: Vec<TransmissionRecord>,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl Transmission {
    /// Start a ledger entry from the first attempt.
    pub fn first(
        notification: Notification,
        receiver: impl Into<String>,
        channel: Channel,
        record: TransmissionRecord,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            notification,
            receiver: receiver.into(),
            channel,
            resend_count: 0,
            status: record.status,
            records: vec![record],
            created: now,
            modified: now,
        }
    }

    /// Append a resend attempt.
    pub fn append(&mut self, record: TransmissionRecord) {
        self.resend_count += 1;
        self.status = record.status;
        self.records.push(record);
    }

    pub fn escalate(&mut self) {
        self.status = TransmissionStatus::Escalated;
    }

    pub fn is_failed(&self) -> bool {
        self.status == TransmissionStatus::Failed
    }

    pub fn is_escalated(&self) -> bool {
        self.status == TransmissionStatus::Escalated
    }

    pub fn latest(&self) -> Option<&TransmissionRecord> {
        self.records.last()
    }
}

impl std::fmt::Display for Transmission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Transmission [id={}, notification={}, receiver={}, channel={}, status={}, resendCount={}",
            self.id, self.notification.slug, self.receiver, self.channel, self.status, self.resend_count
        )?;
        if let Some(last) = self.latest() {
            write!(f, ", lastResponse={}", last.response)?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NotificationSeverity;

    fn sample() -> Transmission {
        let n = Notification::new("n1", "s", NotificationSeverity::Critical, "body");
        Transmission::first(
            n,
            "ops",
            Channel::email(["a@b.c"]),
            TransmissionRecord::failed("relay down"),
        )
    }

    #[test]
    fn test_record_count_tracks_resends() {
        let mut t = sample();
        assert_eq!(t.records.len(), 1 + t.resend_count as usize);
        t.append(TransmissionRecord::failed("still down"));
        t.append(TransmissionRecord::sent("ok"));
        assert_eq!(t.resend_count, 2);
        assert_eq!(t.records.len(), 3);
        assert_eq!(t.status, TransmissionStatus::Sent);
    }

    #[test]
    fn test_display_carries_context() {
        let mut t = sample();
        t.id = "t-1".into();
        let s = t.to_string();
        assert!(s.contains("id=t-1"));
        assert!(s.contains("notification=n1"));
        assert!(s.contains("status=FAILED"));
        assert!(s.contains("relay down"));
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(TransmissionStatus::parse("failed"), Some(TransmissionStatus::Failed));
        assert_eq!(TransmissionStatus::parse("bogus"), None);
    }
}
