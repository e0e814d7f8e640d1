use axum::{
    Router,
    routing::{delete, get, post},
};
use secrecy::SecretString;
use std::sync::Arc;
use tracing::warn;

use crate::incoming::http_axum::{
    handlers::{
        events::member_rejoined,
        health::health_check,
        restrictions::{
            create_restriction, lift_restriction, list_restrictions, member_restriction_status,
        },
    },
    router_ext::RouterExt,
};
use crate::shared::app_state::AppState;

pub fn build_application_router(state: &AppState) -> Router<AppState> {
    let api_token: Option<Arc<SecretString>> =
        state.config.server.api_token.clone().map(Arc::new);

    if api_token.is_none() {
        warn!("No server.api_token configured, moderation endpoints are unauthenticated");
    }

    let public_routes = Router::new().route("/health", get(health_check));

    let moderation_routes = Router::new()
        .route(
            "/restrictions/{category}",
            post(create_restriction).get(list_restrictions),
        )
        .route(
            "/restrictions/{category}/{scope_id}/{subject_id}",
            delete(lift_restriction),
        )
        .route(
            "/scopes/{scope_id}/members/{subject_id}/restrictions",
            get(member_restriction_status),
        )
        .route("/events/member-rejoin", post(member_rejoined))
        .with_api_token(api_token);

    public_routes.merge(moderation_routes).with_request_id()
}
