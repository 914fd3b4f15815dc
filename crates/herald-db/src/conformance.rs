//! Behaviour every `Store` implementation must share, run against each backend.

use chrono::{Duration, Utc};
use herald_core::error::HeraldError;
use herald_core::traits::Store;
use herald_core::types::*;

fn notification(slug: &str, severity: NotificationSeverity) -> Notification {
    Notification::new(slug, "sensor", severity, "content").with_category(NotificationCategory::SwHealth)
}

pub async fn notifications(store: &dyn Store) {
    let inserted = store
        .insert_notification(notification("Disk-Full", NotificationSeverity::Normal))
        .await
        .unwrap();
    assert!(!inserted.id.is_empty());

    let dup = store
        .insert_notification(notification("disk-full", NotificationSeverity::Critical))
        .await;
    assert!(matches!(dup, Err(HeraldError::Conflict(_))));

    let found = store.find_notification_by_slug("DISK-FULL").await.unwrap().unwrap();
    assert_eq!(found.id, inserted.id);
    assert_eq!(found.category, Some(NotificationCategory::SwHealth));

    store
        .insert_notification(notification("cpu-hot", NotificationSeverity::Critical))
        .await
        .unwrap();
    let normal_new = store
        .find_notifications_by_severity_and_status(NotificationSeverity::Normal, NotificationStatus::New)
        .await
        .unwrap();
    assert_eq!(normal_new.len(), 1);

    let mut processed = found.clone();
    processed.status = NotificationStatus::Processed;
    let saved = store.save_notification(processed).await.unwrap();
    assert!(saved.modified >= inserted.modified);
    assert!(store
        .find_notifications_by_severity_and_status(NotificationSeverity::Normal, NotificationStatus::New)
        .await
        .unwrap()
        .is_empty());

    let future = Utc::now() + Duration::seconds(5);
    let old_processed = store
        .find_notifications_modified_before(Some(NotificationStatus::Processed), future)
        .await
        .unwrap();
    assert_eq!(old_processed.len(), 1);
    let old_any = store.find_notifications_modified_before(None, future).await.unwrap();
    assert_eq!(old_any.len(), 2);
    let past = Utc::now() - Duration::seconds(60);
    assert!(store.find_notifications_modified_before(None, past).await.unwrap().is_empty());

    let removed = store
        .delete_notifications(&[inserted.id.clone(), "missing".into()])
        .await
        .unwrap();
    assert_eq!(removed, 1);
    assert!(store.find_notification_by_slug("disk-full").await.unwrap().is_none());
}

pub async fn subscriptions(store: &dyn Store) {
    let ops = store
        .insert_subscription(
            Subscription::new("ops", "ops-team")
                .with_categories([NotificationCategory::SwHealth])
                .with_channel(Channel::email(["ops@example.com"])),
        )
        .await
        .unwrap();
    store
        .insert_subscription(
            Subscription::new("racks", "dc-team")
                .with_labels(["Rack-3"])
                .with_channel(Channel::rest("http://hooks.local", HttpMethod::Post)),
        )
        .await
        .unwrap();

    let dup = store.insert_subscription(Subscription::new("OPS", "x")).await;
    assert!(matches!(dup, Err(HeraldError::Conflict(_))));

    let by_category = store
        .find_subscriptions_by_categories_or_labels(&[NotificationCategory::SwHealth], &[])
        .await
        .unwrap();
    assert_eq!(by_category.len(), 1);
    assert_eq!(by_category[0].slug, "ops");

    let by_label = store
        .find_subscriptions_by_categories_or_labels(&[], &["rack-3".to_string()])
        .await
        .unwrap();
    assert_eq!(by_label.len(), 1);
    assert_eq!(by_label[0].slug, "racks");

    let none = store
        .find_subscriptions_by_categories_or_labels(&[], &[])
        .await
        .unwrap();
    assert!(none.is_empty());

    let found = store.find_subscription_by_slug("Ops").await.unwrap().unwrap();
    assert_eq!(found.channels, vec![Channel::email(["ops@example.com"])]);

    assert!(store.delete_subscription(&ops.id).await.unwrap());
    assert!(!store.delete_subscription(&ops.id).await.unwrap());
    assert!(store.find_subscription_by_slug("ops").await.unwrap().is_none());
}

pub async fn transmissions(store: &dyn Store) {
    let n = store
        .insert_notification(notification("n1", NotificationSeverity::Normal))
        .await
        .unwrap();
    let other = store
        .insert_notification(notification("n2", NotificationSeverity::Normal))
        .await
        .unwrap();

    let failed = store
        .insert_transmission(Transmission::first(
            n.clone(),
            "ops",
            Channel::email(["a@b.c"]),
            TransmissionRecord::failed("down"),
        ))
        .await
        .unwrap();
    store
        .insert_transmission(Transmission::first(
            n.clone(),
            "dc",
            Channel::rest("http://x", HttpMethod::Post),
            TransmissionRecord::sent("ok"),
        ))
        .await
        .unwrap();
    store
        .insert_transmission(Transmission::first(
            other.clone(),
            "ops",
            Channel::email(["a@b.c"]),
            TransmissionRecord::failed("down"),
        ))
        .await
        .unwrap();

    let eligible = store
        .find_transmissions_by_status_and_resend_count_less_than(TransmissionStatus::Failed, 1)
        .await
        .unwrap();
    assert_eq!(eligible.len(), 2);

    let mut resent = failed.clone();
    resent.append(TransmissionRecord::failed("still down"));
    let saved = store.save_transmission(resent).await.unwrap();
    assert_eq!(saved.records.len(), 2);
    let eligible = store
        .find_transmissions_by_status_and_resend_count_less_than(TransmissionStatus::Failed, 1)
        .await
        .unwrap();
    assert_eq!(eligible.len(), 1);

    let for_n1 = store.find_transmissions_by_notification_slug("N1", 10).await.unwrap();
    assert_eq!(for_n1.len(), 2);
    let limited = store.find_transmissions_by_notification_slug("n1", 1).await.unwrap();
    assert_eq!(limited.len(), 1);

    let failed_list = store
        .find_transmissions_by_status(TransmissionStatus::Failed, 10)
        .await
        .unwrap();
    assert_eq!(failed_list.len(), 2);

    let future = Utc::now() + Duration::seconds(5);
    let removed = store
        .delete_transmissions_by_status_modified_before(TransmissionStatus::Sent, future)
        .await
        .unwrap();
    assert_eq!(removed, 1);

    let removed = store
        .delete_transmissions_by_notifications(&[n.id.clone()])
        .await
        .unwrap();
    assert_eq!(removed, 1);
    let remaining = store
        .find_transmissions_by_status(TransmissionStatus::Failed, 10)
        .await
        .unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].notification.id, other.id);
}

async fn tick() {
    tokio::time::sleep(std::time::Duration::from_millis(3)).await;
}

pub async fn notification_queries(store: &dyn Store) {
    let first = store
        .insert_notification(
            Notification::new("boot", "sensor-a", NotificationSeverity::Normal, "up")
                .with_labels(["Rack-1", "power"]),
        )
        .await
        .unwrap();
    tick().await;
    let mid = Utc::now();
    tick().await;
    store
        .insert_notification(
            Notification::new("temp", "Sensor-B", NotificationSeverity::Critical, "hot")
                .with_labels(["rack-2"]),
        )
        .await
        .unwrap();
    tick().await;
    store
        .insert_notification(Notification::new("link", "gateway", NotificationSeverity::Normal, "down"))
        .await
        .unwrap();

    let by_sender = store.find_notifications_by_sender("SENSOR", 10).await.unwrap();
    let slugs: Vec<_> = by_sender.iter().map(|n| n.slug.as_str()).collect();
    assert_eq!(slugs, ["temp", "boot"]);
    assert_eq!(store.find_notifications_by_sender("sensor", 1).await.unwrap().len(), 1);

    let later = store.find_notifications_created_between(Some(mid), None, 10).await.unwrap();
    let slugs: Vec<_> = later.iter().map(|n| n.slug.as_str()).collect();
    assert_eq!(slugs, ["link", "temp"]);
    let earlier = store.find_notifications_created_between(None, Some(mid), 10).await.unwrap();
    assert_eq!(earlier.len(), 1);
    assert_eq!(earlier[0].id, first.id);
    let all = store.find_notifications_created_between(None, None, 2).await.unwrap();
    assert_eq!(all.len(), 2);

    let labelled = store
        .find_notifications_by_labels(&["RACK-1".to_string(), "rack-2".to_string()], 10)
        .await
        .unwrap();
    assert_eq!(labelled.len(), 2);
    assert!(store.find_notifications_by_labels(&[], 10).await.unwrap().is_empty());

    let mut relabelled = first.clone();
    relabelled.labels = Some(vec!["spare".into()]);
    store.save_notification(relabelled).await.unwrap();
    let rack_1 = store.find_notifications_by_labels(&["rack-1".to_string()], 10).await.unwrap();
    assert!(rack_1.is_empty());
    let spare = store.find_notifications_by_labels(&["spare".to_string()], 10).await.unwrap();
    assert_eq!(spare.len(), 1);

    let new = store.find_notifications_by_status(NotificationStatus::New, 10).await.unwrap();
    assert_eq!(new.len(), 3);
    assert_eq!(new[0].slug, "link");
    assert!(store
        .find_notifications_by_status(NotificationStatus::Processed, 10)
        .await
        .unwrap()
        .is_empty());
}

pub async fn subscription_queries(store: &dyn Store) {
    let ops = store
        .insert_subscription(
            Subscription::new("ops", "Ops-Team")
                .with_categories([NotificationCategory::Security, NotificationCategory::HwHealth])
                .with_labels(["rack-1"])
                .with_channel(Channel::email(["ops@example.com"])),
        )
        .await
        .unwrap();
    tick().await;
    store
        .insert_subscription(
            Subscription::new("dev", "dev-team")
                .with_labels(["Build"])
                .with_channel(Channel::email(["dev@example.com"])),
        )
        .await
        .unwrap();

    let all = store.find_all_subscriptions().await.unwrap();
    let slugs: Vec<_> = all.iter().map(|s| s.slug.as_str()).collect();
    assert_eq!(slugs, ["ops", "dev"]);

    let teams = store.find_subscriptions_by_receiver("TEAM").await.unwrap();
    assert_eq!(teams.len(), 2);
    let ops_only = store.find_subscriptions_by_receiver("ops").await.unwrap();
    assert_eq!(ops_only.len(), 1);

    // One subscription matching on both a category and a label is returned once.
    let both = store
        .find_subscriptions_by_categories_or_labels(
            &[NotificationCategory::Security, NotificationCategory::SwHealth],
            &["RACK-1".to_string(), "build".to_string()],
        )
        .await
        .unwrap();
    let slugs: Vec<_> = both.iter().map(|s| s.slug.as_str()).collect();
    assert_eq!(slugs, ["ops", "dev"]);

    let mut moved = ops.clone();
    moved.subscribed_categories = vec![NotificationCategory::SwHealth];
    moved.subscribed_labels = vec![];
    store.save_subscription(moved).await.unwrap();
    assert!(store
        .find_subscriptions_by_categories_or_labels(&[NotificationCategory::Security], &["rack-1".to_string()])
        .await
        .unwrap()
        .is_empty());
    let sw = store
        .find_subscriptions_by_categories_or_labels(&[NotificationCategory::SwHealth], &[])
        .await
        .unwrap();
    assert_eq!(sw.len(), 1);
    assert_eq!(sw[0].id, ops.id);

    assert!(store.delete_subscription(&ops.id).await.unwrap());
    assert!(store
        .find_subscriptions_by_categories_or_labels(&[NotificationCategory::SwHealth], &[])
        .await
        .unwrap()
        .is_empty());
}

pub async fn transmission_queries(store: &dyn Store) {
    let n = store
        .insert_notification(notification("t-range", NotificationSeverity::Normal))
        .await
        .unwrap();
    let early = store
        .insert_transmission(Transmission::first(
            n.clone(),
            "ops",
            Channel::email(["a@b.c"]),
            TransmissionRecord::sent("ok"),
        ))
        .await
        .unwrap();
    tick().await;
    let mid = Utc::now();
    tick().await;
    let late = store
        .insert_transmission(Transmission::first(
            n,
            "dc",
            Channel::email(["d@b.c"]),
            TransmissionRecord::failed("down"),
        ))
        .await
        .unwrap();

    let after = store.find_transmissions_created_between(Some(mid), None, 10).await.unwrap();
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].id, late.id);
    let before = store.find_transmissions_created_between(None, Some(mid), 10).await.unwrap();
    assert_eq!(before.len(), 1);
    assert_eq!(before[0].id, early.id);
    let both = store
        .find_transmissions_created_between(Some(early.created), Some(late.created), 10)
        .await
        .unwrap();
    assert_eq!(both.len(), 2);
    assert_eq!(both[0].id, late.id);
    assert_eq!(store.find_transmissions_created_between(None, None, 1).await.unwrap().len(), 1);
}
