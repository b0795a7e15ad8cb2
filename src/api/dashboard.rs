use axum::{Extension, Json, extract::State};
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState, DashboardDto, UserDto};
use crate::auth::{AuthContext, Permission};

/// GET /dashboard
pub async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<ApiResponse<DashboardDto>>, ApiError> {
    let user = state
        .guard()
        .require_user(&auth, Permission::ViewDashboard)?;

    let (project_count, pending_leave_requests) = tokio::try_join!(
        state.store().count_projects(),
        state.store().count_pending_leave(),
    )?;

    Ok(Json(ApiResponse::success(DashboardDto {
        user: UserDto::from(user),
        permissions: state.guard().effective_permissions(&auth),
        project_count,
        pending_leave_requests,
    })))
}
