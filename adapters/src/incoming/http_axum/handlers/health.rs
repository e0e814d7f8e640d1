use axum::{Json, extract::State};

use crate::incoming::http_axum::{
    dto::responses::{ApiResponse, HealthResponse},
    error_mapper::HttpError,
};
use crate::shared::app_state::AppState;
use domain::restriction::RestrictionCategory;

pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<HealthResponse>>, HttpError> {
    let active_mutes = state
        .restriction_use_case
        .list(RestrictionCategory::Mute)
        .await?
        .len();
    let active_bans = state
        .restriction_use_case
        .list(RestrictionCategory::Ban)
        .await?
        .len();

    Ok(Json(ApiResponse::success_with_data(Some(HealthResponse {
        environment: state.config.environment.env.clone(),
        active_mutes,
        active_bans,
    }))))
}
