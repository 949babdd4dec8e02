use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;

use crate::presentation::http::handlers::RegistryHandler;

pub fn registry_routes(registry_handler: Arc<RegistryHandler>) -> Router {
    Router::new()
        .route(
            "/entities/{entity_uuid}/embeddings",
            get(RegistryHandler::get_embeddings),
        )
        .route(
            "/entities/{entity_uuid}/sync-state",
            get(RegistryHandler::get_sync_state),
        )
        .route(
            "/entities/{entity_uuid}/reconcile",
            post(RegistryHandler::reconcile_entity),
        )
        .route("/reconcile/sweep", post(RegistryHandler::run_sweep))
        .route(
            "/reconcile/failed-deletions",
            get(RegistryHandler::list_failed_deletions),
        )
        .with_state(registry_handler)
}
