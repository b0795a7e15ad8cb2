use axum::{
    Extension, Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
};
use std::sync::Arc;

use super::validation::{validate_date_range, validate_id, validate_reason};
use super::{
    ApiError, ApiResponse, AppState, CreateLeaveRequest, LeaveDecisionRequest, LeaveRequestDto,
};
use crate::auth::{AuthContext, Permission};
use crate::db::NewLeaveRequest;

/// POST /leave-requests
pub async fn create_leave_request(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    payload: Result<Json<CreateLeaveRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<LeaveRequestDto>>), ApiError> {
    let user = state.guard().require_user(&auth, Permission::SubmitLeave)?;
    let Json(payload) = payload?;

    let (start, end) = validate_date_range(&payload.start_date, &payload.end_date)?;
    let reason = validate_reason(&payload.reason)?;

    let request = state
        .store()
        .create_leave_request(NewLeaveRequest {
            user_id: user.id,
            start_date: start.to_string(),
            end_date: end.to_string(),
            reason,
        })
        .await?;

    tracing::info!(
        user_id = user.id,
        leave_request_id = request.id,
        "Leave request submitted"
    );

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(LeaveRequestDto::from(request))),
    ))
}

/// POST /leave-requests/{id}/decision
pub async fn decide_leave_request(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    id: Result<Path<i32>, PathRejection>,
    payload: Result<Json<LeaveDecisionRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<LeaveRequestDto>>, ApiError> {
    let reviewer = state.guard().require_user(&auth, Permission::ApproveLeave)?;
    let Path(id) = id?;
    let Json(payload) = payload?;
    let id = validate_id(id)?;

    if state.store().get_leave_request(id).await?.is_none() {
        return Err(ApiError::not_found("Leave request", id));
    }

    if !state
        .store()
        .decide_leave_request(id, payload.approve, reviewer.id)
        .await?
    {
        return Err(ApiError::conflict("Leave request has already been decided"));
    }

    let request = state
        .store()
        .get_leave_request(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Leave request", id))?;

    tracing::info!(
        reviewer_id = reviewer.id,
        leave_request_id = id,
        status = ?request.status,
        "Leave request decided"
    );

    Ok(Json(ApiResponse::success(LeaveRequestDto::from(request))))
}
