use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use std::sync::Arc;

use super::validation::{validate_id, validate_project_name};
use super::{ApiError, ApiResponse, AppState, CreateProjectRequest, ProjectDto};
use crate::auth::{AuthContext, Permission};
use crate::db::NewProject;

/// GET /projects
pub async fn list_projects(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<ApiResponse<Vec<ProjectDto>>>, ApiError> {
    state
        .guard()
        .require_permission(&auth, Permission::ViewProjects)?;

    let projects = state
        .store()
        .list_projects()
        .await
        .map_err(|e| ApiError::DatabaseError(format!("{e:#}")))?;

    Ok(Json(ApiResponse::success(
        projects.into_iter().map(ProjectDto::from).collect(),
    )))
}

/// POST /projects
pub async fn create_project(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    payload: Result<Json<CreateProjectRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<ProjectDto>>), ApiError> {
    let actor = state
        .guard()
        .require_user(&auth, Permission::ManageProjects)?;
    let Json(payload) = payload?;

    let name = validate_project_name(&payload.name)?;
    let manager_id = payload.manager_id.map(validate_id).transpose()?;

    if let Some(manager_id) = manager_id {
        let exists = state
            .store()
            .get_user(manager_id)
            .await
            .map_err(|e| ApiError::DatabaseError(format!("{e:#}")))?
            .is_some();
        if !exists {
            return Err(ApiError::not_found("User", manager_id));
        }
    }

    if state
        .store()
        .project_name_exists(&name)
        .await
        .map_err(|e| ApiError::DatabaseError(format!("{e:#}")))?
    {
        return Err(ApiError::conflict(format!(
            "A project named {name} already exists"
        )));
    }

    let project = state
        .store()
        .create_project(NewProject {
            name,
            description: payload.description.trim().to_string(),
            manager_id,
        })
        .await
        .map_err(|e| ApiError::DatabaseError(format!("{e:#}")))?;

    tracing::info!(actor_id = actor.id, project_id = project.id, "Project created");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(ProjectDto::from(project))),
    ))
}
