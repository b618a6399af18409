// Route table for the run-code API
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

use crate::handlers;
use crate::AppState;

pub fn routes(max_body_bytes: usize) -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/run-code", post(handlers::run_code))
        .route("/api/languages", get(handlers::list_languages))
        .route("/status", get(handlers::health_check))
        .route("/metrics", get(handlers::export_metrics))
        .layer(DefaultBodyLimit::max(max_body_bytes))
}
