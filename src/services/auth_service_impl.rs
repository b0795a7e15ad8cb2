//! `SeaORM` implementation of the `AuthService` trait.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tokio::task;
use tracing::{info, warn};

use crate::auth::{AuthContext, AuthError, PasswordHasher, SessionIssuer, SessionState};
use crate::config::SecurityConfig;
use crate::db::repositories::user::normalize_email;
use crate::db::{NewUser, Store, User, UserChanges};
use crate::services::auth_service::{
    AccountError, AuthService, LoginResult, NewAccount,
};

/// Verified against on unknown-email logins so both paths cost one argon2 run.
const DUMMY_PASSWORD: &str = "timetracker-dummy-password";

pub struct SeaOrmAuthService {
    store: Store,
    hasher: PasswordHasher,
    sessions: SessionIssuer,
    min_password_length: usize,
    auto_migrate_password_hashes: bool,
    dummy_hash: OnceCell<String>,
}

impl SeaOrmAuthService {
    #[must_use]
    pub fn new(
        store: Store,
        hasher: PasswordHasher,
        sessions: SessionIssuer,
        security: &SecurityConfig,
    ) -> Self {
        Self {
            store,
            hasher,
            sessions,
            min_password_length: security.min_password_length,
            auto_migrate_password_hashes: security.auto_migrate_password_hashes,
            dummy_hash: OnceCell::new(),
        }
    }

    fn validate_new_password(&self, password: &str) -> Result<(), AccountError> {
        if password.chars().count() < self.min_password_length {
            return Err(AccountError::Validation(format!(
                "Password must be at least {} characters",
                self.min_password_length
            )));
        }
        Ok(())
    }

    // Argon2 is CPU and memory heavy; keep it off the async workers.
    async fn hash_blocking(&self, password: &str) -> Result<String, AccountError> {
        let hasher = self.hasher.clone();
        let password = password.to_string();

        task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AccountError::Internal(format!("Password hashing task panicked: {e}")))?
            .map_err(AccountError::from)
    }

    async fn verify_blocking(&self, password: &str, hash: String) -> Result<bool, AccountError> {
        let hasher = self.hasher.clone();
        let password = password.to_string();

        task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| {
                AccountError::Internal(format!("Password verification task panicked: {e}"))
            })
    }

    async fn verify_dummy(&self, password: &str) -> Result<(), AccountError> {
        let hash = self
            .dummy_hash
            .get_or_try_init(|| self.hash_blocking(DUMMY_PASSWORD))
            .await?;
        self.verify_blocking(password, hash.clone()).await?;
        Ok(())
    }

    async fn upgrade_hash_if_needed(&self, user: &User, password: &str, stored_hash: &str) {
        if !self.auto_migrate_password_hashes || !self.hasher.needs_rehash(stored_hash) {
            return;
        }

        let new_hash = match self.hash_blocking(password).await {
            Ok(hash) => hash,
            Err(e) => {
                warn!(user_id = user.id, "Failed to re-hash password: {e}");
                return;
            }
        };

        match self
            .store
            .upgrade_user_password_hash(user.id, stored_hash, &new_hash)
            .await
        {
            Ok(true) => info!(user_id = user.id, "Upgraded password hash parameters"),
            Ok(false) => {}
            Err(e) => warn!(user_id = user.id, "Failed to store upgraded password hash: {e}"),
        }
    }
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn login(&self, email: &str, password: &str) -> Result<LoginResult, AccountError> {
        let email = normalize_email(email);

        let Some((user, stored_hash)) = self.store.get_user_by_email_with_password(&email).await?
        else {
            self.verify_dummy(password).await?;
            return Err(AccountError::InvalidCredentials);
        };

        let is_valid = self.verify_blocking(password, stored_hash.clone()).await?;

        if !is_valid || !user.active {
            return Err(AccountError::InvalidCredentials);
        }

        self.upgrade_hash_if_needed(&user, password, &stored_hash)
            .await;

        let token = self.sessions.issue(user.id)?;
        let state = SessionState::for_user(&user);

        Ok(LoginResult { user, token, state })
    }

    async fn resolve_session(&self, token: &str) -> Result<AuthContext, AccountError> {
        let user_id = match self.sessions.verify(token) {
            Ok(id) => id,
            Err(reason) => return Ok(AuthContext::rejected(reason)),
        };

        match self.store.get_user(user_id).await? {
            Some(user) if user.active => Ok(AuthContext::authenticated(user)),
            _ => Ok(AuthContext::rejected(AuthError::UnknownSubject)),
        }
    }

    async fn change_password(
        &self,
        user_id: i32,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AccountError> {
        self.validate_new_password(new_password)?;

        if current_password == new_password {
            return Err(AccountError::Validation(
                "New password must be different from current password".to_string(),
            ));
        }

        let stored_hash = self
            .store
            .get_user_password_hash(user_id)
            .await?
            .ok_or(AccountError::UserNotFound)?;

        if !self.verify_blocking(current_password, stored_hash).await? {
            return Err(AccountError::Validation(
                "Current password is incorrect".to_string(),
            ));
        }

        let new_hash = self.hash_blocking(new_password).await?;

        if !self.store.set_user_password(user_id, &new_hash, false).await? {
            return Err(AccountError::UserNotFound);
        }

        Ok(())
    }

    async fn create_user(&self, account: NewAccount) -> Result<User, AccountError> {
        self.validate_new_password(&account.password)?;

        if self.store.get_user_by_email(&account.email).await?.is_some() {
            return Err(AccountError::Conflict(format!(
                "A user with email {} already exists",
                normalize_email(&account.email)
            )));
        }

        let password_hash = self.hash_blocking(&account.password).await?;

        let user = self
            .store
            .create_user(NewUser {
                email: account.email,
                full_name: account.full_name,
                password_hash,
                role: account.role,
                must_change_password: account.must_change_password,
            })
            .await?;

        Ok(user)
    }

    async fn get_user(&self, user_id: i32) -> Result<User, AccountError> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or(AccountError::UserNotFound)
    }

    async fn update_user(&self, user_id: i32, changes: UserChanges) -> Result<User, AccountError> {
        self.store
            .update_user(user_id, changes)
            .await?
            .ok_or(AccountError::UserNotFound)
    }

    async fn delete_user(&self, user_id: i32) -> Result<(), AccountError> {
        if self.store.delete_user(user_id).await? {
            Ok(())
        } else {
            Err(AccountError::UserNotFound)
        }
    }

    async fn reset_password(&self, user_id: i32, new_password: &str) -> Result<(), AccountError> {
        self.validate_new_password(new_password)?;

        let new_hash = self.hash_blocking(new_password).await?;

        if !self.store.set_user_password(user_id, &new_hash, true).await? {
            return Err(AccountError::UserNotFound);
        }

        Ok(())
    }
}
