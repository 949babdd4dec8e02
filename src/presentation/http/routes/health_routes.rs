use axum::{Json, Router, http::StatusCode, response::IntoResponse, routing::get};
use std::sync::Arc;

use crate::presentation::http::dto::ApiResponse;
use crate::presentation::http::handlers::RegistryHandler;

pub fn health_routes(registry_handler: Arc<RegistryHandler>) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(RegistryHandler::health))
        .with_state(registry_handler)
}

async fn root_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(ApiResponse::success("resume-registry".to_string())),
    )
}
