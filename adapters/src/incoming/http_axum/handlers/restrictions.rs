use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::{info, instrument};
use validator::Validate;

use crate::incoming::http_axum::{
    dto::{
        requests::CreateRestrictionRequest,
        responses::{ApiResponse, RestrictionResponse, RestrictionStatusResponse},
    },
    error_mapper::HttpError,
};
use crate::shared::app_state::AppState;
use domain::restriction::{RestrictionCategory, RestrictionKey, ScopeId, SubjectId};
use warden_application::{error::AppError, ports::incoming::restrictions::RestrictRequest};

#[instrument(skip(state, request), fields(category = %category))]
pub async fn create_restriction(
    State(state): State<AppState>,
    Path(category): Path<RestrictionCategory>,
    Json(request): Json<CreateRestrictionRequest>,
) -> Result<(StatusCode, Json<ApiResponse<RestrictionResponse>>), HttpError> {
    if let Err(e) = request.validate() {
        return Err(HttpError(AppError::ValidationError {
            message: format!("Validation failed: {e}"),
        }));
    }

    let entry = state
        .restriction_use_case
        .restrict(RestrictRequest {
            category,
            key: request.key(),
            duration: request.duration(),
        })
        .await?;

    info!(key = %entry.key, expires_at = %entry.expires_at, "Restriction created");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success_with_data(Some(RestrictionResponse::new(
            category, &entry,
        )))),
    ))
}

#[instrument(skip(state))]
pub async fn lift_restriction(
    State(state): State<AppState>,
    Path((category, scope_id, subject_id)): Path<(RestrictionCategory, u64, u64)>,
) -> Result<Json<ApiResponse<()>>, HttpError> {
    let key = RestrictionKey::new(SubjectId(subject_id), ScopeId(scope_id));
    state.restriction_use_case.lift(category, key).await?;

    info!(%key, "Restriction lifted manually");
    Ok(Json(ApiResponse::success()))
}

pub async fn list_restrictions(
    State(state): State<AppState>,
    Path(category): Path<RestrictionCategory>,
) -> Result<Json<ApiResponse<Vec<RestrictionResponse>>>, HttpError> {
    let mut entries = state.restriction_use_case.list(category).await?;
    entries.sort_by_key(|entry| entry.expires_at);

    let restrictions = entries
        .iter()
        .map(|entry| RestrictionResponse::new(category, entry))
        .collect();

    Ok(Json(ApiResponse::success_with_data(Some(restrictions))))
}

pub async fn member_restriction_status(
    State(state): State<AppState>,
    Path((scope_id, subject_id)): Path<(u64, u64)>,
) -> Result<Json<ApiResponse<Vec<RestrictionStatusResponse>>>, HttpError> {
    let key = RestrictionKey::new(SubjectId(subject_id), ScopeId(scope_id));
    let statuses = state
        .restriction_use_case
        .status(key)
        .await?
        .into_iter()
        .map(RestrictionStatusResponse::from)
        .collect();

    Ok(Json(ApiResponse::success_with_data(Some(statuses))))
}
