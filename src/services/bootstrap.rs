//! Bootstrap administrator lifecycle.
//!
//! The first admin is provisioned from configuration at startup, and only
//! while no admin exists at all. It always starts in the forced-change state.

use anyhow::{Context, Result};
use tokio::task;
use tracing::info;

use crate::auth::{PasswordHasher, Role};
use crate::config::BootstrapConfig;
use crate::db::repositories::user::normalize_email;
use crate::db::{NewUser, Store};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    Created,
    AlreadyProvisioned,
}

pub async fn ensure_bootstrap_admin(
    store: &Store,
    hasher: &PasswordHasher,
    config: &BootstrapConfig,
) -> Result<BootstrapOutcome> {
    if store.count_admins().await? > 0 {
        info!("Bootstrap admin settings ignored after initial bootstrap");
        return Ok(BootstrapOutcome::AlreadyProvisioned);
    }

    let email = normalize_email(&config.admin_email);
    if email.is_empty() || !email.contains('@') {
        anyhow::bail!("bootstrap.admin_email must be a valid email address");
    }
    if config.admin_password.is_empty() {
        anyhow::bail!("bootstrap.admin_password must be set before first startup");
    }

    let password_hash = hash_blocking(hasher, &config.admin_password).await?;

    store
        .create_user(NewUser {
            email: email.clone(),
            full_name: config.admin_full_name.clone(),
            password_hash,
            role: Role::Admin,
            must_change_password: true,
        })
        .await?;

    info!("Bootstrap admin {email} created; password change required on first login");
    Ok(BootstrapOutcome::Created)
}

/// Reset the bootstrap admin's password and force a change on next login.
///
/// Returns `false` when no admin with that email exists.
pub async fn reset_bootstrap_admin_password(
    store: &Store,
    hasher: &PasswordHasher,
    email: &str,
    new_password: &str,
) -> Result<bool> {
    let Some(admin) = store.find_admin_by_email(email).await? else {
        return Ok(false);
    };

    let password_hash = hash_blocking(hasher, new_password).await?;
    let updated = store
        .set_user_password(admin.id, &password_hash, true)
        .await?;

    if updated {
        info!(user_id = admin.id, "Bootstrap admin password reset");
    }
    Ok(updated)
}

async fn hash_blocking(hasher: &PasswordHasher, password: &str) -> Result<String> {
    let hasher = hasher.clone();
    let password = password.to_string();

    task::spawn_blocking(move || hasher.hash(&password))
        .await
        .context("Password hashing task panicked")?
}
