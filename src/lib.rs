use std::sync::Arc;

use axum::{Router, extract::DefaultBodyLimit};

use analysis::service::AnalysisService;
use config::Config;
use history::HistoryStore;
use infrastructure::BlobStorage;

pub mod analysis;
pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod history;
pub mod infrastructure;
pub mod middleware;
pub mod rate_limit;
pub mod utils;

pub mod routes;

/// multipart 边界和其他字段的余量
const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub analysis: Arc<AnalysisService>,
    pub history: HistoryStore,
    pub blobs: Arc<dyn BlobStorage>,
}

/// 组装完整路由，CORS 由调用方按编译模式决定
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.upload_max_bytes + MULTIPART_OVERHEAD_BYTES;

    let base = state.config.api_base_uri.trim_end_matches('/');
    let router = if base.is_empty() {
        routes::api_routes()
    } else {
        Router::new().nest(base, routes::api_routes())
    };

    router
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(axum::middleware::from_fn(middleware::log_errors))
        .with_state(state)
}
