use std::sync::Arc;

use axum::{
    http::{header::CONTENT_TYPE, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use super::error::ApiError;
use super::handlers::ratings;
use super::types::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE]);

    Router::new()
        .route("/api/save-rating", post(ratings::save_rating))
        .route("/api/get-ratings", get(ratings::get_ratings))
        .route("/api/reset-ratings", post(ratings::reset_ratings))
        .fallback(not_found)
        .method_not_allowed_fallback(not_found)
        .layer(cors)
        .with_state(state)
}

async fn not_found() -> ApiError {
    ApiError::NotFound
}
