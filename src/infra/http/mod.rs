mod handlers;
mod middleware;
mod models;

use std::sync::Arc;

use axum::{
    Router,
    http::{Method, header::CONTENT_TYPE},
    middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::{application::render::RenderService, config::CorsSettings};

pub use models::RenderBody;

#[derive(Clone)]
pub struct HttpState {
    pub render: Arc<RenderService>,
}

pub fn build_router(state: HttpState, cors: &CorsSettings) -> Router {
    Router::new()
        .route("/", get(handlers::health))
        .route("/render", post(handlers::render))
        .with_state(state)
        .layer(axum_middleware::from_fn(middleware::log_responses))
        .layer(axum_middleware::from_fn(middleware::set_request_context))
        .layer(cors_layer(cors))
}

fn cors_layer(cors: &CorsSettings) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(cors.allowed_origins.iter().cloned()))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
}
