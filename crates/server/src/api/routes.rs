use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::middleware::{auth_middleware, metrics_middleware};
use super::{handlers, integrations, jobs, supervisor};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Routes that require a caller identity
    let protected = Router::new()
        .route("/config", get(handlers::get_config))
        // Jobs
        .route("/jobs", post(jobs::create_job))
        .route("/jobs", get(jobs::list_jobs))
        .route("/jobs/{id}", get(jobs::get_job))
        .route("/jobs/{id}/cancel", post(jobs::cancel_job))
        // Integrations
        .route(
            "/integrations/{project_id}/{provider_type}",
            get(integrations::get_integration),
        )
        .route(
            "/integrations/{project_id}/{provider_type}/test",
            post(integrations::test_integration),
        )
        // Worker supervisor
        .route("/supervisor/start", post(supervisor::start_worker))
        .route("/supervisor/status", get(supervisor::worker_status))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth_middleware,
        ));

    let api_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .merge(protected)
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
}
