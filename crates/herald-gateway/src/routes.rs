//! API route handlers for the gateway.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use herald_core::error::HeraldError;
use herald_core::types::{Notification, NotificationCategory, Subscription, TransmissionStatus};

use crate::server::AppState;

type Shared = State<Arc<AppState>>;
type ApiResult = Result<Response, ApiError>;

/// Maps engine errors onto HTTP statuses with a `{"ok": false, "error": ..}` body.
#[derive(Debug)]
pub enum ApiError {
    Engine(HeraldError),
    LimitExceeded { limit: usize, max: usize },
}

impl From<HeraldError> for ApiError {
    fn from(e: HeraldError) -> Self {
        ApiError::Engine(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::LimitExceeded { limit, max } => (
                StatusCode::PAYLOAD_TOO_LARGE,
                format!("limit {limit} exceeds the read limit of {max}"),
            ),
            ApiError::Engine(e) => {
                let status = match &e {
                    HeraldError::Validation(_) => StatusCode::BAD_REQUEST,
                    HeraldError::NotFound(_) => StatusCode::NOT_FOUND,
                    HeraldError::Conflict(_) => StatusCode::CONFLICT,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if status.is_server_error() {
                    tracing::error!("❌ API error: {e}");
                }
                (status, e.to_string())
            }
        };
        (status, Json(serde_json::json!({"ok": false, "error": message}))).into_response()
    }
}

fn check_limit(state: &AppState, limit: usize) -> Result<(), ApiError> {
    if limit > state.read_limit {
        return Err(ApiError::LimitExceeded { limit, max: state.read_limit });
    }
    Ok(())
}

fn parse_status(raw: &str) -> Result<TransmissionStatus, ApiError> {
    TransmissionStatus::parse(raw)
        .ok_or_else(|| HeraldError::validation(format!("unknown transmission status '{raw}'")).into())
}

/// Epoch milliseconds from a path segment.
fn parse_instant(millis: i64) -> Result<DateTime<Utc>, ApiError> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| HeraldError::validation(format!("timestamp {millis} out of range")).into())
}

/// Comma-separated labels; blanks are dropped.
fn parse_labels(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_categories(raw: &str) -> Result<Vec<NotificationCategory>, ApiError> {
    raw.split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(|c| {
            NotificationCategory::parse(c)
                .ok_or_else(|| HeraldError::validation(format!("unknown category '{c}'")).into())
        })
        .collect()
}

// ─── Service ───────────────────────────────────────────────

pub async fn ping() -> &'static str {
    "pong"
}

pub async fn info(State(state): Shared) -> Json<serde_json::Value> {
    let config = state.herald.config();
    Json(serde_json::json!({
        "service": "herald",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "resend_limit": config.distribution.resend_limit,
        "read_limit": state.read_limit,
        "watermarks": state.herald.watermarks().snapshot(),
    }))
}

// ─── Notifications ─────────────────────────────────────────

pub async fn create_notification(State(state): Shared, Json(notification): Json<Notification>) -> ApiResult {
    let receipt = state.herald.notifications().receive(notification).await?;
    // Dispatch handles are dropped; delivery continues in the background.
    Ok((StatusCode::CREATED, Json(receipt.notification)).into_response())
}

pub async fn get_notification(State(state): Shared, Path(slug): Path<String>) -> ApiResult {
    let notification = state.herald.notifications().find_by_slug(&slug).await?;
    Ok(Json(notification).into_response())
}

pub async fn delete_notification(State(state): Shared, Path(slug): Path<String>) -> ApiResult {
    state.herald.notifications().delete_by_slug(&slug).await?;
    Ok(Json(serde_json::json!({"ok": true})).into_response())
}

pub async fn delete_processed_notifications(State(state): Shared, Path(age): Path<u64>) -> ApiResult {
    let report = state
        .herald
        .cleanup()
        .delete_processed_older_than(Duration::from_millis(age))
        .await?;
    Ok(Json(report).into_response())
}

pub async fn notifications_by_sender(
    State(state): Shared,
    Path((sender, limit)): Path<(String, usize)>,
) -> ApiResult {
    check_limit(&state, limit)?;
    let list = state.herald.notifications().find_by_sender(&sender, limit).await?;
    Ok(Json(list).into_response())
}

pub async fn notifications_created_between(
    State(state): Shared,
    Path((start, end, limit)): Path<(i64, i64, usize)>,
) -> ApiResult {
    check_limit(&state, limit)?;
    let (start, end) = (parse_instant(start)?, parse_instant(end)?);
    let list = state
        .herald
        .notifications()
        .find_created_between(Some(start), Some(end), limit)
        .await?;
    Ok(Json(list).into_response())
}

pub async fn notifications_created_after(
    State(state): Shared,
    Path((start, limit)): Path<(i64, usize)>,
) -> ApiResult {
    check_limit(&state, limit)?;
    let start = parse_instant(start)?;
    let list = state
        .herald
        .notifications()
        .find_created_between(Some(start), None, limit)
        .await?;
    Ok(Json(list).into_response())
}

pub async fn notifications_created_before(
    State(state): Shared,
    Path((end, limit)): Path<(i64, usize)>,
) -> ApiResult {
    check_limit(&state, limit)?;
    let end = parse_instant(end)?;
    let list = state
        .herald
        .notifications()
        .find_created_between(None, Some(end), limit)
        .await?;
    Ok(Json(list).into_response())
}

pub async fn notifications_by_labels(
    State(state): Shared,
    Path((labels, limit)): Path<(String, usize)>,
) -> ApiResult {
    check_limit(&state, limit)?;
    let list = state
        .herald
        .notifications()
        .find_by_labels(&parse_labels(&labels), limit)
        .await?;
    Ok(Json(list).into_response())
}

pub async fn new_notifications(State(state): Shared, Path(limit): Path<usize>) -> ApiResult {
    check_limit(&state, limit)?;
    let list = state.herald.notifications().find_new(limit).await?;
    Ok(Json(list).into_response())
}

// ─── Subscriptions ─────────────────────────────────────────

pub async fn list_subscriptions(State(state): Shared) -> ApiResult {
    let list = state.herald.subscriptions().list_all().await?;
    Ok(Json(list).into_response())
}

pub async fn create_subscription(State(state): Shared, Json(subscription): Json<Subscription>) -> ApiResult {
    let stored = state.herald.subscriptions().create(subscription).await?;
    Ok((StatusCode::CREATED, Json(stored)).into_response())
}

pub async fn update_subscription(State(state): Shared, Json(subscription): Json<Subscription>) -> ApiResult {
    let saved = state.herald.subscriptions().update(subscription).await?;
    Ok(Json(saved).into_response())
}

pub async fn get_subscription(State(state): Shared, Path(slug): Path<String>) -> ApiResult {
    let subscription = state.herald.subscriptions().find_by_slug(&slug).await?;
    Ok(Json(subscription).into_response())
}

pub async fn delete_subscription(State(state): Shared, Path(slug): Path<String>) -> ApiResult {
    state.herald.subscriptions().delete_by_slug(&slug).await?;
    Ok(Json(serde_json::json!({"ok": true})).into_response())
}

pub async fn subscriptions_by_categories_and_labels(
    State(state): Shared,
    Path((categories, labels)): Path<(String, String)>,
) -> ApiResult {
    let categories = parse_categories(&categories)?;
    let list = state
        .herald
        .subscriptions()
        .find_by_categories_or_labels(&categories, &parse_labels(&labels))
        .await?;
    Ok(Json(list).into_response())
}

pub async fn subscriptions_by_categories(State(state): Shared, Path(categories): Path<String>) -> ApiResult {
    let categories = parse_categories(&categories)?;
    let list = state
        .herald
        .subscriptions()
        .find_by_categories_or_labels(&categories, &[])
        .await?;
    Ok(Json(list).into_response())
}

pub async fn subscriptions_by_labels(State(state): Shared, Path(labels): Path<String>) -> ApiResult {
    let list = state
        .herald
        .subscriptions()
        .find_by_categories_or_labels(&[], &parse_labels(&labels))
        .await?;
    Ok(Json(list).into_response())
}

pub async fn subscriptions_by_receiver(State(state): Shared, Path(receiver): Path<String>) -> ApiResult {
    let list = state.herald.subscriptions().find_by_receiver(&receiver).await?;
    Ok(Json(list).into_response())
}

// ─── Transmissions ─────────────────────────────────────────

pub async fn transmissions_by_slug(
    State(state): Shared,
    Path((slug, limit)): Path<(String, usize)>,
) -> ApiResult {
    check_limit(&state, limit)?;
    let list = state
        .herald
        .transmissions()
        .find_by_notification_slug(&slug, limit)
        .await?;
    Ok(Json(list).into_response())
}

pub async fn failed_transmissions(State(state): Shared, Path(limit): Path<usize>) -> ApiResult {
    check_limit(&state, limit)?;
    let list = state.herald.transmissions().find_failed(limit).await?;
    Ok(Json(list).into_response())
}

pub async fn escalated_transmissions(State(state): Shared, Path(limit): Path<usize>) -> ApiResult {
    check_limit(&state, limit)?;
    let list = state.herald.transmissions().find_escalated(limit).await?;
    Ok(Json(list).into_response())
}

pub async fn transmissions_created_between(
    State(state): Shared,
    Path((start, end, limit)): Path<(i64, i64, usize)>,
) -> ApiResult {
    check_limit(&state, limit)?;
    let (start, end) = (parse_instant(start)?, parse_instant(end)?);
    let list = state
        .herald
        .transmissions()
        .find_created_between(Some(start), Some(end), limit)
        .await?;
    Ok(Json(list).into_response())
}

pub async fn transmissions_created_after(
    State(state): Shared,
    Path((start, limit)): Path<(i64, usize)>,
) -> ApiResult {
    check_limit(&state, limit)?;
    let start = parse_instant(start)?;
    let list = state
        .herald
        .transmissions()
        .find_created_between(Some(start), None, limit)
        .await?;
    Ok(Json(list).into_response())
}

pub async fn transmissions_created_before(
    State(state): Shared,
    Path((end, limit)): Path<(i64, usize)>,
) -> ApiResult {
    check_limit(&state, limit)?;
    let end = parse_instant(end)?;
    let list = state
        .herald
        .transmissions()
        .find_created_between(None, Some(end), limit)
        .await?;
    Ok(Json(list).into_response())
}

pub async fn delete_transmissions(
    State(state): Shared,
    Path((status, age)): Path<(String, u64)>,
) -> ApiResult {
    let status = parse_status(&status)?;
    let removed = state
        .herald
        .cleanup()
        .delete_transmissions_older_than(status, Duration::from_millis(age))
        .await?;
    Ok(Json(serde_json::json!({"ok": true, "removed": removed})).into_response())
}

// ─── Cleanup ───────────────────────────────────────────────

pub async fn cleanup(State(state): Shared) -> ApiResult {
    let report = state.herald.cleanup().cleanup().await?;
    Ok(Json(report).into_response())
}

pub async fn cleanup_age(State(state): Shared, Path(age): Path<u64>) -> ApiResult {
    let report = state
        .herald
        .cleanup()
        .cleanup_older_than(Duration::from_millis(age))
        .await?;
    Ok(Json(report).into_response())
}
