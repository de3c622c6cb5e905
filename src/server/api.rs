//! API route definitions

use std::sync::Arc;
use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::{handlers, state::AppState, ServerConfig};

async fn handle_404() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Not found. Check /health for API status." })),
    )
}

/// Create the main application router
pub fn create_router(state: Arc<AppState>, config: &ServerConfig) -> Router {
    Router::new()
        // Dataset store
        .route("/store_data", post(handlers::data::store_data))
        .route("/delete_data", post(handlers::data::delete_data))
        .route("/fetch_data_names", get(handlers::data::fetch_data_names))
        .route("/fetch_dataset", get(handlers::data::fetch_dataset))
        // Model persistence
        .route("/save_model", post(handlers::persistence::save_model))
        .route("/save_unsupervised", post(handlers::persistence::save_unsupervised))
        .route("/delete_model", post(handlers::persistence::delete_model))
        .route("/fetch_model_names", get(handlers::persistence::fetch_model_names))
        .route("/load_model", post(handlers::persistence::load_model))
        // Linear regression
        .route("/train_lin_reg", post(handlers::training::train_lin_reg))
        .route("/load_lin_reg", post(handlers::training::load_lin_reg))
        .route("/infer_lin_reg", post(handlers::inference::infer_lin_reg))
        // Logistic regression
        .route("/train_log_reg", post(handlers::training::train_log_reg))
        .route("/load_log_reg", post(handlers::training::load_log_reg))
        .route("/infer_log_reg", post(handlers::inference::infer_log_reg))
        // Random forest
        .route("/train_random_forest", post(handlers::training::train_random_forest))
        .route("/load_random_forest", post(handlers::training::load_random_forest))
        .route("/graph_random_forest", post(handlers::graphs::graph_random_forest))
        .route("/infer_random_forest", post(handlers::inference::infer_random_forest))
        // Gradient boosting
        .route("/train_grad_boost_reg", post(handlers::training::train_grad_boost_reg))
        .route("/load_grad_boost_reg", post(handlers::training::load_grad_boost_reg))
        .route("/graph_grad_boost_reg", post(handlers::graphs::graph_grad_boost_reg))
        .route("/infer_grad_boost_reg", post(handlers::inference::infer_grad_boost_reg))
        // Clustering
        .route("/train_k_means", post(handlers::training::train_k_means))
        .route("/load_k_means", post(handlers::training::load_k_means))
        .route("/infer_k_means", post(handlers::inference::infer_k_means))
        // System
        .route("/health", get(handlers::health_check))
        .fallback(handle_404)
        .layer(DefaultBodyLimit::max(config.max_upload_size))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
