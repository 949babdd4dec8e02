pub mod health_routes;
pub mod registry_routes;

pub use health_routes::*;
pub use registry_routes::*;

use axum::Router;
use std::sync::Arc;

use crate::presentation::http::handlers::RegistryHandler;

pub fn api_routes(registry_handler: Arc<RegistryHandler>) -> Router {
    Router::new()
        .merge(health_routes(registry_handler.clone()))
        .merge(registry_routes(registry_handler))
}
