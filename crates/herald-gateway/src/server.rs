//! HTTP server implementation using Axum.

use std::future::Future;
use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post},
};
use herald_scheduler::Herald;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::routes;

/// Shared state for the gateway server.
#[derive(Clone)]
pub struct AppState {
    pub herald: Arc<Herald>,
    /// Largest `limit` accepted by list routes.
    pub read_limit: usize,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(herald: Arc<Herald>) -> Self {
        let read_limit = herald.config().gateway.read_limit;
        Self {
            herald,
            read_limit,
            start_time: std::time::Instant::now(),
        }
    }
}

fn cors_layer() -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers(Any)
        .max_age(std::time::Duration::from_secs(3600));

    // Example: HERALD_CORS_ORIGINS=https://ops.example.com,https://noc.example.com
    if let Ok(origins) = std::env::var("HERALD_CORS_ORIGINS") {
        let origins: Vec<_> = origins
            .split(',')
            .filter_map(|s| s.trim().parse::<axum::http::HeaderValue>().ok())
            .collect();
        cors.allow_origin(origins)
    } else {
        cors.allow_origin(Any)
    }
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/ping", get(routes::ping))
        .route("/api/v1/info", get(routes::info))
        // Notifications
        .route("/api/v1/notification", post(routes::create_notification))
        .route(
            "/api/v1/notification/slug/{slug}",
            get(routes::get_notification).delete(routes::delete_notification),
        )
        .route("/api/v1/notification/age/{age}", delete(routes::delete_processed_notifications))
        .route("/api/v1/notification/sender/{sender}/{limit}", get(routes::notifications_by_sender))
        .route(
            "/api/v1/notification/created/{start}/{end}/{limit}",
            get(routes::notifications_created_between),
        )
        .route("/api/v1/notification/start/{start}/{limit}", get(routes::notifications_created_after))
        .route("/api/v1/notification/end/{end}/{limit}", get(routes::notifications_created_before))
        .route("/api/v1/notification/labels/{labels}/{limit}", get(routes::notifications_by_labels))
        .route("/api/v1/notification/new/{limit}", get(routes::new_notifications))
        // Subscriptions
        .route(
            "/api/v1/subscription",
            get(routes::list_subscriptions)
                .post(routes::create_subscription)
                .put(routes::update_subscription),
        )
        .route(
            "/api/v1/subscription/slug/{slug}",
            get(routes::get_subscription).delete(routes::delete_subscription),
        )
        .route(
            "/api/v1/subscription/categories/{categories}/labels/{labels}",
            get(routes::subscriptions_by_categories_and_labels),
        )
        .route("/api/v1/subscription/categories/{categories}", get(routes::subscriptions_by_categories))
        .route("/api/v1/subscription/labels/{labels}", get(routes::subscriptions_by_labels))
        .route("/api/v1/subscription/receiver/{receiver}", get(routes::subscriptions_by_receiver))
        // Transmissions
        .route("/api/v1/transmission/slug/{slug}/{limit}", get(routes::transmissions_by_slug))
        .route(
            "/api/v1/transmission/created/{start}/{end}/{limit}",
            get(routes::transmissions_created_between),
        )
        .route("/api/v1/transmission/start/{start}/{limit}", get(routes::transmissions_created_after))
        .route("/api/v1/transmission/end/{end}/{limit}", get(routes::transmissions_created_before))
        .route("/api/v1/transmission/failed/{limit}", get(routes::failed_transmissions))
        .route("/api/v1/transmission/escalated/{limit}", get(routes::escalated_transmissions))
        .route(
            "/api/v1/transmission/status/{status}/age/{age}",
            delete(routes::delete_transmissions),
        )
        // Cleanup
        .route("/api/v1/cleanup", delete(routes::cleanup))
        .route("/api/v1/cleanup/age/{age}", delete(routes::cleanup_age))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// Serve until `shutdown` resolves.
pub async fn start(
    herald: Arc<Herald>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let gateway = herald.config().gateway.clone();
    let app = build_router(AppState::new(herald));
    let addr = format!("{}:{}", gateway.host, gateway.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("🌐 Gateway listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
