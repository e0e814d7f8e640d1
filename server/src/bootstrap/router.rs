use axum::{
    Router,
    http::{HeaderName, HeaderValue, Method},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;

use crate::bootstrap::state::AppState;
use warden_adapters::incoming::http_axum::routes::build_application_router;
use warden_adapters::shared::app_state::AppState as AdaptersAppState;

pub fn create_router(state: &AppState) -> Router {
    let adapters_state = state.to_adapters_state();
    let cors_layer = create_cors_layer(&adapters_state);

    build_application_router(&adapters_state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer),
        )
        .with_state(adapters_state)
}

fn create_cors_layer(state: &AdaptersAppState) -> CorsLayer {
    let base_cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            HeaderName::from_static("content-type"),
            HeaderName::from_static("authorization"),
            HeaderName::from_static("accept"),
            HeaderName::from_static("x-request-id"),
        ]);

    match &state.config.server.cors_origin {
        Some(origin) => match origin.parse::<HeaderValue>() {
            Ok(origin) => base_cors.allow_origin(origin),
            Err(_) => {
                warn!(origin = %origin, "Ignoring unparsable cors_origin");
                base_cors
            }
        },
        None => base_cors,
    }
}
