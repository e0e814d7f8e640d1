use axum::{Json, extract::State, http::StatusCode};
use tracing::debug;

use crate::incoming::http_axum::{
    dto::{requests::MemberRejoinRequest, responses::ApiResponse},
    error_mapper::HttpError,
};
use crate::shared::app_state::AppState;
use domain::events::MemberRejoinedEvent;

/// Queues the event for the rejoin listener and answers before it is handled.
pub async fn member_rejoined(
    State(state): State<AppState>,
    Json(request): Json<MemberRejoinRequest>,
) -> Result<(StatusCode, Json<ApiResponse<()>>), HttpError> {
    let event = MemberRejoinedEvent::from(request);
    state.rejoin_events.publish_member_rejoined(event)?;

    debug!(key = %event.key(), "Member rejoin queued");
    Ok((StatusCode::ACCEPTED, Json(ApiResponse::success())))
}
