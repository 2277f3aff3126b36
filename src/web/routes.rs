//! 路由表

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::web::handlers;
use crate::web::types::AppState;

/// 构建应用路由
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/cache_stats", get(handlers::cache_stats))
        .route("/api/translate_batch", post(handlers::translate_batch))
        .route("/api/translate/:rev_id", post(handlers::translate_section))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
