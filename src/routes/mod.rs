use axum::{
    Router,
    routing::{get, post},
};

use crate::AppState;

pub mod analysis;
pub mod history;
pub mod upload;

/// 业务路由，挂载在 `API_BASE_URI` 之下
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/upload", post(upload::upload))
        .route("/analyze", post(analysis::analyze))
        .route(
            "/history",
            get(history::list_history).delete(history::clear_history),
        )
        .route(
            "/history/{id}",
            get(history::get_analysis).delete(history::delete_analysis),
        )
        .route(
            "/history/{id}/comparison",
            get(history::compare_with_previous),
        )
}
