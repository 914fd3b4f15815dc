//! SQLite store. Each table keeps the columns queries filter on plus the
//! full record as JSON.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use herald_core::error::{HeraldError, Result};
use herald_core::traits::Store;
use herald_core::types::{
    Notification, NotificationCategory, NotificationSeverity, NotificationStatus, Subscription,
    Transmission, TransmissionStatus,
};
use rusqlite::{Connection, ErrorCode, params, params_from_iter};
use serde::de::DeserializeOwned;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

fn db_err(e: rusqlite::Error) -> HeraldError {
    HeraldError::Store(e.to_string())
}

/// Unique-index violations become `Conflict`.
fn write_err(what: &str, slug: &str, e: rusqlite::Error) -> HeraldError {
    match &e {
        rusqlite::Error::SqliteFailure(f, _) if f.code == ErrorCode::ConstraintViolation => {
            HeraldError::Conflict(format!("{what} slug '{slug}' exists"))
        }
        _ => db_err(e),
    }
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn query_bodies<T: DeserializeOwned>(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<T>> {
    let mut stmt = conn.prepare(sql).map_err(db_err)?;
    let bodies = stmt
        .query_map(params, |row| row.get::<_, String>(0))
        .map_err(db_err)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(db_err)?;
    bodies
        .iter()
        .map(|b| serde_json::from_str(b).map_err(HeraldError::from))
        .collect()
}

/// `?, ?, ?` for an `IN (..)` list of `n` values.
fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Bounds of an optional created range, as epoch milliseconds.
fn created_range(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> (i64, i64) {
    (
        start.map_or(i64::MIN, |s| s.timestamp_millis()),
        end.map_or(i64::MAX, |e| e.timestamp_millis()),
    )
}

fn write_notification_labels(conn: &Connection, notification: &Notification) -> Result<()> {
    conn.execute(
        "DELETE FROM notification_labels WHERE notification_id = ?1",
        params![notification.id],
    )
    .map_err(db_err)?;
    for label in notification.label_set() {
        conn.execute(
            "INSERT OR IGNORE INTO notification_labels (notification_id, label) VALUES (?1, ?2)",
            params![notification.id, label],
        )
        .map_err(db_err)?;
    }
    Ok(())
}

fn write_subscription_interests(conn: &Connection, subscription: &Subscription) -> Result<()> {
    conn.execute(
        "DELETE FROM subscription_categories WHERE subscription_id = ?1",
        params![subscription.id],
    )
    .map_err(db_err)?;
    conn.execute(
        "DELETE FROM subscription_labels WHERE subscription_id = ?1",
        params![subscription.id],
    )
    .map_err(db_err)?;
    for category in &subscription.subscribed_categories {
        conn.execute(
            "INSERT OR IGNORE INTO subscription_categories (subscription_id, category) VALUES (?1, ?2)",
            params![subscription.id, category.as_str()],
        )
        .map_err(db_err)?;
    }
    for label in &subscription.subscribed_labels {
        conn.execute(
            "INSERT OR IGNORE INTO subscription_labels (subscription_id, label) VALUES (?1, ?2)",
            params![subscription.id, label],
        )
        .map_err(db_err)?;
    }
    Ok(())
}

impl SqliteStore {
    /// Open (or create) the database file and run migrations.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(db_err)?;
        tracing::info!("🗄️ SQLite store: {}", path.display());
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory().map_err(db_err)?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let store = Self { conn: Mutex::new(conn) };
        store.migrate()?;
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| HeraldError::Store(format!("connection poisoned: {e}")))
    }

    fn migrate(&self) -> Result<()> {
        self.lock()?
            .execute_batch(
                "
            CREATE TABLE IF NOT EXISTS notifications (
                id TEXT PRIMARY KEY,
                slug TEXT NOT NULL UNIQUE COLLATE NOCASE,
                sender TEXT NOT NULL,
                severity TEXT NOT NULL,
                status TEXT NOT NULL,
                created_ms INTEGER NOT NULL,
                modified_ms INTEGER NOT NULL,
                body TEXT NOT NULL             -- JSON Notification
            );
            CREATE INDEX IF NOT EXISTS idx_notifications_sweep
                ON notifications(severity, status);
            CREATE INDEX IF NOT EXISTS idx_notifications_created
                ON notifications(created_ms);

            CREATE TABLE IF NOT EXISTS notification_labels (
                notification_id TEXT NOT NULL,
                label TEXT NOT NULL COLLATE NOCASE,
                PRIMARY KEY (notification_id, label)
            );
            CREATE INDEX IF NOT EXISTS idx_notification_labels_label
                ON notification_labels(label);

            CREATE TABLE IF NOT EXISTS subscriptions (
                id TEXT PRIMARY KEY,
                slug TEXT NOT NULL UNIQUE COLLATE NOCASE,
                receiver TEXT NOT NULL,
                created_ms INTEGER NOT NULL,
                body TEXT NOT NULL             -- JSON Subscription
            );

            CREATE TABLE IF NOT EXISTS subscription_categories (
                subscription_id TEXT NOT NULL,
                category TEXT NOT NULL,
                PRIMARY KEY (subscription_id, category)
            );
            CREATE INDEX IF NOT EXISTS idx_subscription_categories_category
                ON subscription_categories(category);

            CREATE TABLE IF NOT EXISTS subscription_labels (
                subscription_id TEXT NOT NULL,
                label TEXT NOT NULL COLLATE NOCASE,
                PRIMARY KEY (subscription_id, label)
            );
            CREATE INDEX IF NOT EXISTS idx_subscription_labels_label
                ON subscription_labels(label);

            CREATE TABLE IF NOT EXISTS transmissions (
                id TEXT PRIMARY KEY,
                notification_id TEXT NOT NULL,
                notification_slug TEXT NOT NULL COLLATE NOCASE,
                status TEXT NOT NULL,
                resend_count INTEGER NOT NULL,
                created_ms INTEGER NOT NULL,
                modified_ms INTEGER NOT NULL,
                body TEXT NOT NULL             -- JSON Transmission
            );
            CREATE INDEX IF NOT EXISTS idx_transmissions_status
                ON transmissions(status, resend_count);
            CREATE INDEX IF NOT EXISTS idx_transmissions_notification
                ON transmissions(notification_id);
            CREATE INDEX IF NOT EXISTS idx_transmissions_created
                ON transmissions(created_ms);
            ",
            )
            .map_err(|e| HeraldError::Store(format!("Migration: {e}")))
    }
}

#[async_trait]
impl Store for SqliteStore {
    // ─── Notifications ─────────────────────────────────────

    async fn insert_notification(&self, mut notification: Notification) -> Result<Notification> {
        let now = Utc::now();
        notification.id = new_id();
        notification.created = now;
        notification.modified = now;
        let body = serde_json::to_string(&notification)?;
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(db_err)?;
        tx.execute(
            "INSERT INTO notifications (id, slug, sender, severity, status, created_ms, modified_ms, body)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                notification.id,
                notification.slug,
                notification.sender,
                notification.severity.as_str(),
                notification.status.as_str(),
                now.timestamp_millis(),
                now.timestamp_millis(),
                body,
            ],
        )
        .map_err(|e| write_err("notification", &notification.slug, e))?;
        write_notification_labels(&tx, &notification)?;
        tx.commit().map_err(db_err)?;
        Ok(notification)
    }

    async fn save_notification(&self, mut notification: Notification) -> Result<Notification> {
        notification.modified = Utc::now();
        let body = serde_json::to_string(&notification)?;
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(db_err)?;
        let changed = tx
            .execute(
                "UPDATE notifications
                 SET slug = ?2, sender = ?3, severity = ?4, status = ?5, modified_ms = ?6, body = ?7
                 WHERE id = ?1",
                params![
                    notification.id,
                    notification.slug,
                    notification.sender,
                    notification.severity.as_str(),
                    notification.status.as_str(),
                    notification.modified.timestamp_millis(),
                    body,
                ],
            )
            .map_err(|e| write_err("notification", &notification.slug, e))?;
        if changed == 0 {
            return Err(HeraldError::not_found(format!("notification {}", notification.id)));
        }
        write_notification_labels(&tx, &notification)?;
        tx.commit().map_err(db_err)?;
        Ok(notification)
    }

    async fn delete_notifications(&self, ids: &[String]) -> Result<usize> {
        let conn = self.lock()?;
        let mut removed = 0;
        for id in ids {
            removed += conn
                .execute("DELETE FROM notifications WHERE id = ?1", params![id])
                .map_err(db_err)?;
            conn.execute("DELETE FROM notification_labels WHERE notification_id = ?1", params![id])
                .map_err(db_err)?;
        }
        Ok(removed)
    }

    async fn find_notification_by_slug(&self, slug: &str) -> Result<Option<Notification>> {
        let conn = self.lock()?;
        let found: Vec<Notification> = query_bodies(
            &conn,
            "SELECT body FROM notifications WHERE slug = ?1",
            params![slug],
        )?;
        Ok(found.into_iter().next())
    }

    async fn find_notifications_by_severity_and_status(
        &self,
        severity: NotificationSeverity,
        status: NotificationStatus,
    ) -> Result<Vec<Notification>> {
        let conn = self.lock()?;
        query_bodies(
            &conn,
            "SELECT body FROM notifications WHERE severity = ?1 AND status = ?2 ORDER BY created_ms",
            params![severity.as_str(), status.as_str()],
        )
    }

    async fn find_notifications_modified_before(
        &self,
        status: Option<NotificationStatus>,
        before: DateTime<Utc>,
    ) -> Result<Vec<Notification>> {
        let conn = self.lock()?;
        match status {
            Some(status) => query_bodies(
                &conn,
                "SELECT body FROM notifications WHERE status = ?1 AND modified_ms < ?2",
                params![status.as_str(), before.timestamp_millis()],
            ),
            None => query_bodies(
                &conn,
                "SELECT body FROM notifications WHERE modified_ms < ?1",
                params![before.timestamp_millis()],
            ),
        }
    }

    async fn find_notifications_by_sender(&self, sender: &str, limit: usize) -> Result<Vec<Notification>> {
        let conn = self.lock()?;
        query_bodies(
            &conn,
            "SELECT body FROM notifications WHERE instr(lower(sender), lower(?1)) > 0
             ORDER BY created_ms DESC LIMIT ?2",
            params![sender, limit as i64],
        )
    }

    async fn find_notifications_created_between(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<Notification>> {
        let (from, to) = created_range(start, end);
        let conn = self.lock()?;
        query_bodies(
            &conn,
            "SELECT body FROM notifications WHERE created_ms BETWEEN ?1 AND ?2
             ORDER BY created_ms DESC LIMIT ?3",
            params![from, to, limit as i64],
        )
    }

    async fn find_notifications_by_labels(&self, labels: &[String], limit: usize) -> Result<Vec<Notification>> {
        if labels.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT body FROM notifications WHERE id IN
               (SELECT notification_id FROM notification_labels WHERE label IN ({}))
             ORDER BY created_ms DESC LIMIT {limit}",
            placeholders(labels.len())
        );
        let conn = self.lock()?;
        query_bodies(&conn, &sql, params_from_iter(labels))
    }

    async fn find_notifications_by_status(
        &self,
        status: NotificationStatus,
        limit: usize,
    ) -> Result<Vec<Notification>> {
        let conn = self.lock()?;
        query_bodies(
            &conn,
            "SELECT body FROM notifications WHERE status = ?1 ORDER BY created_ms DESC LIMIT ?2",
            params![status.as_str(), limit as i64],
        )
    }

    // ─── Subscriptions ─────────────────────────────────────

    async fn insert_subscription(&self, mut subscription: Subscription) -> Result<Subscription> {
        let now = Utc::now();
        subscription.id = new_id();
        subscription.created = now;
        subscription.modified = now;
        let body = serde_json::to_string(&subscription)?;
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(db_err)?;
        tx.execute(
            "INSERT INTO subscriptions (id, slug, receiver, created_ms, body) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                subscription.id,
                subscription.slug,
                subscription.receiver,
                now.timestamp_millis(),
                body
            ],
        )
        .map_err(|e| write_err("subscription", &subscription.slug, e))?;
        write_subscription_interests(&tx, &subscription)?;
        tx.commit().map_err(db_err)?;
        Ok(subscription)
    }

    async fn save_subscription(&self, mut subscription: Subscription) -> Result<Subscription> {
        subscription.modified = Utc::now();
        let body = serde_json::to_string(&subscription)?;
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(db_err)?;
        let changed = tx
            .execute(
                "UPDATE subscriptions SET slug = ?2, receiver = ?3, body = ?4 WHERE id = ?1",
                params![subscription.id, subscription.slug, subscription.receiver, body],
            )
            .map_err(|e| write_err("subscription", &subscription.slug, e))?;
        if changed == 0 {
            return Err(HeraldError::not_found(format!("subscription {}", subscription.id)));
        }
        write_subscription_interests(&tx, &subscription)?;
        tx.commit().map_err(db_err)?;
        Ok(subscription)
    }

    async fn delete_subscription(&self, id: &str) -> Result<bool> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(db_err)?;
        let removed = tx
            .execute("DELETE FROM subscriptions WHERE id = ?1", params![id])
            .map_err(db_err)?;
        tx.execute("DELETE FROM subscription_categories WHERE subscription_id = ?1", params![id])
            .map_err(db_err)?;
        tx.execute("DELETE FROM subscription_labels WHERE subscription_id = ?1", params![id])
            .map_err(db_err)?;
        tx.commit().map_err(db_err)?;
        Ok(removed > 0)
    }

    async fn find_subscription_by_slug(&self, slug: &str) -> Result<Option<Subscription>> {
        let conn = self.lock()?;
        let found: Vec<Subscription> = query_bodies(
            &conn,
            "SELECT body FROM subscriptions WHERE slug = ?1",
            params![slug],
        )?;
        Ok(found.into_iter().next())
    }

    async fn find_subscriptions_by_categories_or_labels(
        &self,
        categories: &[NotificationCategory],
        labels: &[String],
    ) -> Result<Vec<Subscription>> {
        if categories.is_empty() && labels.is_empty() {
            return Ok(Vec::new());
        }
        let mut sources = Vec::new();
        if !categories.is_empty() {
            sources.push(format!(
                "SELECT subscription_id FROM subscription_categories WHERE category IN ({})",
                placeholders(categories.len())
            ));
        }
        if !labels.is_empty() {
            sources.push(format!(
                "SELECT subscription_id FROM subscription_labels WHERE label IN ({})",
                placeholders(labels.len())
            ));
        }
        let sql = format!(
            "SELECT body FROM subscriptions WHERE id IN ({}) ORDER BY created_ms",
            sources.join(" UNION ")
        );
        let values = categories
            .iter()
            .map(|c| c.as_str().to_string())
            .chain(labels.iter().cloned());
        let conn = self.lock()?;
        query_bodies(&conn, &sql, params_from_iter(values))
    }

    async fn find_all_subscriptions(&self) -> Result<Vec<Subscription>> {
        let conn = self.lock()?;
        query_bodies(&conn, "SELECT body FROM subscriptions ORDER BY created_ms", [])
    }

    async fn find_subscriptions_by_receiver(&self, receiver: &str) -> Result<Vec<Subscription>> {
        let conn = self.lock()?;
        query_bodies(
            &conn,
            "SELECT body FROM subscriptions WHERE instr(lower(receiver), lower(?1)) > 0
             ORDER BY created_ms",
            params![receiver],
        )
    }

    // ─── Transmissions ─────────────────────────────────────

    async fn insert_transmission(&self, mut transmission: Transmission) -> Result<Transmission> {
        let now = Utc::now();
        transmission.id = new_id();
        transmission.created = now;
        transmission.modified = now;
        let body = serde_json::to_string(&transmission)?;
        self.lock()?
            .execute(
                "INSERT INTO transmissions
                 (id, notification_id, notification_slug, status, resend_count, created_ms, modified_ms, body)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    transmission.id,
                    transmission.notification.id,
                    transmission.notification.slug,
                    transmission.status.as_str(),
                    transmission.resend_count,
                    now.timestamp_millis(),
                    now.timestamp_millis(),
                    body,
                ],
            )
            .map_err(db_err)?;
        Ok(transmission)
    }

    async fn save_transmission(&self, mut transmission: Transmission) -> Result<Transmission> {
        transmission.modified = Utc::now();
        let body = serde_json::to_string(&transmission)?;
        let changed = self
            .lock()?
            .execute(
                "UPDATE transmissions SET status = ?2, resend_count = ?3, modified_ms = ?4, body = ?5
                 WHERE id = ?1",
                params![
                    transmission.id,
                    transmission.status.as_str(),
                    transmission.resend_count,
                    transmission.modified.timestamp_millis(),
                    body,
                ],
            )
            .map_err(db_err)?;
        if changed == 0 {
            return Err(HeraldError::not_found(format!("transmission {}", transmission.id)));
        }
        Ok(transmission)
    }

    async fn find_transmissions_by_status_and_resend_count_less_than(
        &self,
        status: TransmissionStatus,
        resend_limit: u32,
    ) -> Result<Vec<Transmission>> {
        let conn = self.lock()?;
        query_bodies(
            &conn,
            "SELECT body FROM transmissions WHERE status = ?1 AND resend_count < ?2 ORDER BY created_ms",
            params![status.as_str(), resend_limit],
        )
    }

    async fn find_transmissions_by_notification_slug(
        &self,
        slug: &str,
        limit: usize,
    ) -> Result<Vec<Transmission>> {
        let conn = self.lock()?;
        query_bodies(
            &conn,
            "SELECT body FROM transmissions WHERE notification_slug = ?1
             ORDER BY created_ms DESC LIMIT ?2",
            params![slug, limit as i64],
        )
    }

    async fn find_transmissions_by_status(
        &self,
        status: TransmissionStatus,
        limit: usize,
    ) -> Result<Vec<Transmission>> {
        let conn = self.lock()?;
        query_bodies(
            &conn,
            "SELECT body FROM transmissions WHERE status = ?1 ORDER BY created_ms DESC LIMIT ?2",
            params![status.as_str(), limit as i64],
        )
    }

    async fn find_transmissions_created_between(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<Transmission>> {
        let (from, to) = created_range(start, end);
        let conn = self.lock()?;
        query_bodies(
            &conn,
            "SELECT body FROM transmissions WHERE created_ms BETWEEN ?1 AND ?2
             ORDER BY created_ms DESC LIMIT ?3",
            params![from, to, limit as i64],
        )
    }

    async fn delete_transmissions_by_notifications(&self, ids: &[String]) -> Result<usize> {
        let conn = self.lock()?;
        let mut removed = 0;
        for id in ids {
            removed += conn
                .execute("DELETE FROM transmissions WHERE notification_id = ?1", params![id])
                .map_err(db_err)?;
        }
        Ok(removed)
    }

    async fn delete_transmissions_by_status_modified_before(
        &self,
        status: TransmissionStatus,
        before: DateTime<Utc>,
    ) -> Result<usize> {
        self.lock()?
            .execute(
                "DELETE FROM transmissions WHERE status = ?1 AND modified_ms < ?2",
                params![status.as_str(), before.timestamp_millis()],
            )
            .map_err(db_err)
    }
}
