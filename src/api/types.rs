use serde::{Deserialize, Serialize};

use crate::auth::{Permission, Role, SessionState};
use crate::db::{LeaveRequest, Project, User};
use crate::entities::leave_requests::LeaveStatus;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserDto {
    pub id: i32,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub active: bool,
    pub must_change_password: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&User> for UserDto {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            role: user.role,
            active: user.active,
            must_change_password: user.must_change_password,
            created_at: user.created_at.clone(),
            updated_at: user.updated_at.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionDto {
    pub user: UserDto,
    pub state: SessionState,
    pub permissions: Vec<Permission>,
}

#[derive(Debug, Serialize)]
pub struct ProjectDto {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub status: String,
    pub manager_id: Option<i32>,
    pub created_at: String,
}

impl From<Project> for ProjectDto {
    fn from(project: Project) -> Self {
        Self {
            id: project.id,
            name: project.name,
            description: project.description,
            status: project.status,
            manager_id: project.manager_id,
            created_at: project.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LeaveRequestDto {
    pub id: i32,
    pub user_id: i32,
    pub start_date: String,
    pub end_date: String,
    pub reason: String,
    pub status: LeaveStatus,
    pub reviewer_id: Option<i32>,
    pub reviewed_at: Option<String>,
    pub created_at: String,
}

impl From<LeaveRequest> for LeaveRequestDto {
    fn from(request: LeaveRequest) -> Self {
        Self {
            id: request.id,
            user_id: request.user_id,
            start_date: request.start_date,
            end_date: request.end_date,
            reason: request.reason,
            status: request.status,
            reviewer_id: request.reviewer_id,
            reviewed_at: request.reviewed_at,
            created_at: request.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DashboardDto {
    pub user: UserDto,
    pub permissions: Vec<Permission>,
    pub project_count: u64,
    pub pending_leave_requests: u64,
}

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub manager_id: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct CreateLeaveRequest {
    pub start_date: String,
    pub end_date: String,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct LeaveDecisionRequest {
    pub approve: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub full_name: String,
    pub password: String,
    pub role: Role,
    /// Admin-chosen passwords are temporary unless stated otherwise.
    #[serde(default = "default_true")]
    pub must_change_password: bool,
}

/// Absent fields are left unchanged.
#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub full_name: Option<String>,
    pub role: Option<Role>,
    pub active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub new_password: String,
}

const fn default_true() -> bool {
    true
}
