//! 라우트 정의.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers;
use crate::{MasterState, SlaveState};

/// master API 라우트 (`/api` 하위에 마운트)
pub fn master_routes() -> Router<MasterState> {
    Router::new()
        .route(
            "/capture_and_detect",
            post(handlers::master::capture_and_detect),
        )
        .route("/results", get(handlers::master::list_results))
        .route("/health", get(handlers::master::health))
        .route(
            "/test_slave_connection",
            post(handlers::master::test_slave_connection),
        )
}

/// slave API 라우트 (루트에 마운트)
pub fn slave_routes() -> Router<SlaveState> {
    Router::new()
        .route("/sprinkle", post(handlers::slave::sprinkle))
        .route("/health", get(handlers::slave::health))
        .route("/status", get(handlers::slave::status))
        .route("/stats", get(handlers::slave::stats))
        .route("/test", post(handlers::slave::test_spray))
}
