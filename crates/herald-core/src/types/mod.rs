//! Record types shared by the store, the schedulers and the gateway.

pub mod notification;
pub mod subscription;
pub mod transmission;

pub use notification::{Notification, NotificationCategory, NotificationSeverity, NotificationStatus};
pub use subscription::{Channel, ChannelKind, HttpMethod, Subscription, ESCALATION_SUBSCRIPTION_SLUG};
pub use transmission::{Transmission, TransmissionRecord, TransmissionStatus};
