use axum::{middleware, routing::get, Router};
use tower_http::trace::TraceLayer;

use super::health;
use super::middleware::{logging_middleware, metrics_middleware};
use super::state::AppState;
use super::users;
use crate::infrastructure::observability::{create_metrics_router, PrometheusMetrics};

/// Create the full router with application state.
///
/// The metrics endpoint is merged outside the logging layer so scrapes are
/// not logged.
pub fn create_router(state: AppState, metrics: Option<(PrometheusMetrics, &str)>) -> Router {
    let router = Router::new()
        // Health endpoints
        .route("/health", get(health::health_check))
        .route("/ready", get(health::ready_check))
        .route("/live", get(health::live_check))
        .nest("/users", users::create_users_router(&state))
        .with_state(state)
        .layer(middleware::from_fn(logging_middleware))
        .layer(middleware::from_fn(metrics_middleware));

    let router = match metrics {
        Some((metrics, path)) => router.merge(create_metrics_router(metrics, path)),
        None => router,
    };

    router.layer(TraceLayer::new_for_http())
}
