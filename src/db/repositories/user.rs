use anyhow::{Context, Result};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    Set,
};

use crate::entities::users::{self, Role};

/// User data returned from repository (without sensitive password hash)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i32,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub active: bool,
    pub must_change_password: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<users::Model> for User {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            email: model.email,
            full_name: model.full_name,
            role: model.role,
            active: model.active,
            must_change_password: model.must_change_password,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub full_name: String,
    pub password_hash: String,
    pub role: Role,
    pub must_change_password: bool,
}

/// Profile fields an administrator may change. `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub full_name: Option<String>,
    pub role: Option<Role>,
    pub active: Option<bool>,
}

/// Canonical form used for storage and lookup.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get_by_id(&self, id: i32) -> Result<Option<User>> {
        let user = users::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user by ID")?;

        Ok(user.map(User::from))
    }

    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = users::Entity::find()
            .filter(users::Column::Email.eq(normalize_email(email)))
            .one(&self.conn)
            .await
            .context("Failed to query user by email")?;

        Ok(user.map(User::from))
    }

    /// Get user by email together with the stored password hash (for login)
    pub async fn get_by_email_with_password(&self, email: &str) -> Result<Option<(User, String)>> {
        let user = users::Entity::find()
            .filter(users::Column::Email.eq(normalize_email(email)))
            .one(&self.conn)
            .await
            .context("Failed to query user by email")?;

        Ok(user.map(|u| {
            let password_hash = u.password_hash.clone();
            (User::from(u), password_hash)
        }))
    }

    pub async fn get_password_hash(&self, id: i32) -> Result<Option<String>> {
        let user = users::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user for password hash")?;

        Ok(user.map(|u| u.password_hash))
    }

    pub async fn create(&self, new_user: NewUser) -> Result<User> {
        let now = chrono::Utc::now().to_rfc3339();

        let active = users::ActiveModel {
            email: Set(normalize_email(&new_user.email)),
            full_name: Set(new_user.full_name),
            password_hash: Set(new_user.password_hash),
            role: Set(new_user.role),
            active: Set(true),
            must_change_password: Set(new_user.must_change_password),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        let model = active
            .insert(&self.conn)
            .await
            .context("Failed to insert user")?;

        Ok(User::from(model))
    }

    /// Apply `changes` and return the updated user, or `None` if it is gone.
    pub async fn update(&self, id: i32, changes: UserChanges) -> Result<Option<User>> {
        let Some(model) = users::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user for update")?
        else {
            return Ok(None);
        };

        let mut record: users::ActiveModel = model.into();
        if let Some(full_name) = changes.full_name {
            record.full_name = Set(full_name);
        }
        if let Some(role) = changes.role {
            record.role = Set(role);
        }
        if let Some(is_active) = changes.active {
            record.active = Set(is_active);
        }
        record.updated_at = Set(chrono::Utc::now().to_rfc3339());

        let model = record
            .update(&self.conn)
            .await
            .context("Failed to update user")?;

        Ok(Some(User::from(model)))
    }

    pub async fn delete(&self, id: i32) -> Result<bool> {
        let result = users::Entity::delete_by_id(id)
            .exec(&self.conn)
            .await
            .context("Failed to delete user")?;

        Ok(result.rows_affected > 0)
    }

    /// Replace the password hash and the forced-change flag in one UPDATE, so
    /// a concurrent login sees either the old row or the new one.
    pub async fn set_password(
        &self,
        id: i32,
        password_hash: &str,
        must_change_password: bool,
    ) -> Result<bool> {
        let now = chrono::Utc::now().to_rfc3339();

        let result = users::Entity::update_many()
            .col_expr(users::Column::PasswordHash, Expr::value(password_hash))
            .col_expr(
                users::Column::MustChangePassword,
                Expr::value(must_change_password),
            )
            .col_expr(users::Column::UpdatedAt, Expr::value(now))
            .filter(users::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to update user password")?;

        Ok(result.rows_affected > 0)
    }

    /// Swap in a re-hashed password only if the stored hash is still `old_hash`.
    /// Leaves `must_change_password` alone.
    pub async fn upgrade_password_hash(
        &self,
        id: i32,
        old_hash: &str,
        new_hash: &str,
    ) -> Result<bool> {
        let result = users::Entity::update_many()
            .col_expr(users::Column::PasswordHash, Expr::value(new_hash))
            .filter(users::Column::Id.eq(id))
            .filter(users::Column::PasswordHash.eq(old_hash))
            .exec(&self.conn)
            .await
            .context("Failed to upgrade password hash")?;

        Ok(result.rows_affected > 0)
    }

    pub async fn count_by_role(&self, role: Role) -> Result<u64> {
        users::Entity::find()
            .filter(users::Column::Role.eq(role))
            .count(&self.conn)
            .await
            .context("Failed to count users by role")
    }

    pub async fn find_admin_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = users::Entity::find()
            .filter(users::Column::Role.eq(Role::Admin))
            .filter(users::Column::Email.eq(normalize_email(email)))
            .one(&self.conn)
            .await
            .context("Failed to query admin by email")?;

        Ok(user.map(User::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email("  Admin@Change.ME "), "admin@change.me");
    }
}
