use axum::{
    Extension, Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
};
use std::sync::Arc;

use super::validation::{validate_email, validate_full_name, validate_id};
use super::{
    ApiError, ApiResponse, AppState, CreateUserRequest, MessageResponse, ResetPasswordRequest,
    UpdateUserRequest, UserDto,
};
use crate::auth::{AuthContext, AuthError, Permission, can_manage};
use crate::db::{User, UserChanges};
use crate::services::{AccountError, NewAccount};

/// POST /users
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<UserDto>>), ApiError> {
    let actor = state.guard().require_user(&auth, Permission::ManageUsers)?;
    let Json(payload) = payload?;
    if !can_manage(actor.role, payload.role) {
        return Err(deny(actor, "create"));
    }

    let email = validate_email(&payload.email)?;
    let full_name = validate_full_name(&payload.full_name)?;

    let user = state
        .auth()
        .create_user(NewAccount {
            email,
            full_name,
            password: payload.password,
            role: payload.role,
            must_change_password: payload.must_change_password,
        })
        .await?;

    tracing::info!(
        actor_id = actor.id,
        user_id = user.id,
        role = %user.role,
        "User created"
    );

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(UserDto::from(&user))),
    ))
}

/// PATCH /users/{id}
///
/// The actor must be able to manage both the target's current role and the
/// role it is being moved to.
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    id: Result<Path<i32>, PathRejection>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<UserDto>>, ApiError> {
    let actor = state.guard().require_user(&auth, Permission::ManageUsers)?;
    let Path(id) = id?;
    let Json(payload) = payload?;
    let id = validate_id(id)?;

    let full_name = payload
        .full_name
        .as_deref()
        .map(validate_full_name)
        .transpose()?;

    if full_name.is_none() && payload.role.is_none() && payload.active.is_none() {
        return Err(ApiError::validation("No changes requested"));
    }

    if actor.id == id && (payload.role.is_some() || payload.active == Some(false)) {
        return Err(ApiError::validation(
            "You cannot change your own role or deactivate your own account",
        ));
    }

    let target = load_target(&state, id).await?;
    let new_role = payload.role.unwrap_or(target.role);
    if !can_manage(actor.role, target.role) || !can_manage(actor.role, new_role) {
        return Err(deny(actor, "update"));
    }

    let user = state
        .auth()
        .update_user(
            id,
            UserChanges {
                full_name,
                role: payload.role,
                active: payload.active,
            },
        )
        .await?;

    tracing::info!(
        actor_id = actor.id,
        user_id = user.id,
        role = %user.role,
        active = user.active,
        "User updated"
    );

    Ok(Json(ApiResponse::success(UserDto::from(&user))))
}

/// DELETE /users/{id}
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    id: Result<Path<i32>, PathRejection>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let actor = state.guard().require_user(&auth, Permission::ManageUsers)?;
    let Path(id) = id?;
    let id = validate_id(id)?;

    if actor.id == id {
        return Err(ApiError::validation("You cannot delete your own account"));
    }

    let target = load_target(&state, id).await?;
    if !can_manage(actor.role, target.role) {
        return Err(deny(actor, "delete"));
    }

    state.auth().delete_user(id).await?;

    tracing::info!(actor_id = actor.id, user_id = id, "User deleted");

    Ok(Json(ApiResponse::success(MessageResponse::new(
        "User deleted",
    ))))
}

/// POST /users/{id}/reset-password
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    id: Result<Path<i32>, PathRejection>,
    payload: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let actor = state.guard().require_user(&auth, Permission::ManageUsers)?;
    let Path(id) = id?;
    let Json(payload) = payload?;
    let id = validate_id(id)?;

    let target = load_target(&state, id).await?;
    if !can_manage(actor.role, target.role) {
        return Err(deny(actor, "reset"));
    }

    state.auth().reset_password(id, &payload.new_password).await?;

    tracing::info!(actor_id = actor.id, user_id = id, "User password reset");

    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Password reset; the user must choose a new one at next login",
    ))))
}

async fn load_target(state: &AppState, id: i32) -> Result<User, ApiError> {
    match state.auth().get_user(id).await {
        Ok(user) => Ok(user),
        Err(AccountError::UserNotFound) => Err(ApiError::not_found("User", id)),
        Err(e) => Err(e.into()),
    }
}

fn deny(actor: &User, action: &'static str) -> ApiError {
    metrics::counter!("auth_guard_denied_total", "reason" => "role_hierarchy").increment(1);
    tracing::debug!(actor_id = actor.id, action, "Role hierarchy denied user management");
    AuthError::Forbidden.into()
}
