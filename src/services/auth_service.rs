//! Domain service for authentication and account management.
//!
//! Handles login, session resolution, password changes and administrator
//! account operations.

use thiserror::Error;

use crate::auth::{AuthContext, Role, SessionState};
use crate::db::{User, UserChanges};

/// Errors specific to account operations.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("User not found")]
    UserNotFound,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for AccountError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for AccountError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{err:#}"))
    }
}

/// Successful login: the user and a freshly signed session token.
#[derive(Debug, Clone)]
pub struct LoginResult {
    pub user: User,
    pub token: String,
    pub state: SessionState,
}

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub full_name: String,
    pub password: String,
    pub role: Role,
    pub must_change_password: bool,
}

/// Domain service trait for authentication.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Verifies credentials and issues a session token.
    ///
    /// # Errors
    ///
    /// Returns [`AccountError::InvalidCredentials`] for an unknown email, a
    /// wrong password or a deactivated account alike.
    async fn login(&self, email: &str, password: &str) -> Result<LoginResult, AccountError>;

    /// Resolves a session token to a request identity. Token problems yield
    /// an anonymous context, not an error; only infrastructure failures are
    /// returned as `Err`.
    async fn resolve_session(&self, token: &str) -> Result<AuthContext, AccountError>;

    /// Changes the caller's own password and clears the forced-change flag.
    ///
    /// # Errors
    ///
    /// Returns [`AccountError::Validation`] if the current password is
    /// incorrect or the new one violates the password policy.
    async fn change_password(
        &self,
        user_id: i32,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AccountError>;

    async fn create_user(&self, account: NewAccount) -> Result<User, AccountError>;

    async fn get_user(&self, user_id: i32) -> Result<User, AccountError>;

    /// Applies profile changes. Deactivating a user ends their sessions at the
    /// next request and blocks login.
    async fn update_user(&self, user_id: i32, changes: UserChanges) -> Result<User, AccountError>;

    async fn delete_user(&self, user_id: i32) -> Result<(), AccountError>;

    /// Administrator-initiated reset; the user must change the password on
    /// next use.
    async fn reset_password(&self, user_id: i32, new_password: &str) -> Result<(), AccountError>;
}
