use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::middleware::metrics_middleware;
use super::{candidates, handlers, jobs, policies, settings, tasks, ws};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Classification and context
        .route("/release/parse", post(handlers::parse_release))
        .route("/fields", get(handlers::list_fields))
        // Candidates
        .route("/candidates", post(candidates::ingest))
        .route(
            "/candidates/{indexer_id}/{guid}/preview",
            post(candidates::preview),
        )
        .route(
            "/candidates/{indexer_id}/{guid}/enqueue",
            post(candidates::enqueue),
        )
        // Policies
        .route(
            "/policies",
            get(policies::list_policies).post(policies::create_policy),
        )
        .route(
            "/policies/{id}",
            get(policies::get_policy)
                .put(policies::update_policy)
                .delete(policies::delete_policy),
        )
        // Download jobs
        .route("/jobs", get(jobs::list_jobs))
        .route("/jobs/{id}", get(jobs::get_job).delete(jobs::cancel_job))
        .route("/jobs/{id}/timeline", get(jobs::job_timeline))
        .route("/jobs/{id}/tasks", get(jobs::job_tasks))
        // Import tasks
        .route("/tasks", get(tasks::list_tasks))
        .route("/tasks/{id}", get(tasks::get_task).delete(tasks::cancel_task))
        .route("/tasks/{id}/reimport", post(tasks::reimport_task))
        .route("/tasks/{id}/timeline", get(tasks::task_timeline))
        .route("/tasks/{id}/history", get(tasks::task_history))
        // Settings
        .route("/settings", get(settings::list_settings))
        .route(
            "/settings/{key}",
            get(settings::get_setting).put(settings::update_setting),
        );

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/ws", get(ws::ws_handler))
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
