use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::entities::users::Role;

pub mod migrator;
pub mod repositories;

pub use repositories::leave::{LeaveRequest, NewLeaveRequest};
pub use repositories::project::{NewProject, Project};
pub use repositories::user::{NewUser, User, UserChanges};

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite:").trim_start_matches("//");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    fn project_repo(&self) -> repositories::project::ProjectRepository {
        repositories::project::ProjectRepository::new(self.conn.clone())
    }

    fn leave_repo(&self) -> repositories::leave::LeaveRepository {
        repositories::leave::LeaveRepository::new(self.conn.clone())
    }

    // Users

    pub async fn get_user(&self, id: i32) -> Result<Option<User>> {
        self.user_repo().get_by_id(id).await
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.user_repo().get_by_email(email).await
    }

    pub async fn get_user_by_email_with_password(
        &self,
        email: &str,
    ) -> Result<Option<(User, String)>> {
        self.user_repo().get_by_email_with_password(email).await
    }

    pub async fn get_user_password_hash(&self, id: i32) -> Result<Option<String>> {
        self.user_repo().get_password_hash(id).await
    }

    pub async fn create_user(&self, user: NewUser) -> Result<User> {
        self.user_repo().create(user).await
    }

    pub async fn update_user(&self, id: i32, changes: UserChanges) -> Result<Option<User>> {
        self.user_repo().update(id, changes).await
    }

    pub async fn delete_user(&self, id: i32) -> Result<bool> {
        self.user_repo().delete(id).await
    }

    pub async fn set_user_password(
        &self,
        id: i32,
        password_hash: &str,
        must_change_password: bool,
    ) -> Result<bool> {
        self.user_repo()
            .set_password(id, password_hash, must_change_password)
            .await
    }

    pub async fn upgrade_user_password_hash(
        &self,
        id: i32,
        old_hash: &str,
        new_hash: &str,
    ) -> Result<bool> {
        self.user_repo()
            .upgrade_password_hash(id, old_hash, new_hash)
            .await
    }

    pub async fn count_admins(&self) -> Result<u64> {
        self.user_repo().count_by_role(Role::Admin).await
    }

    pub async fn find_admin_by_email(&self, email: &str) -> Result<Option<User>> {
        self.user_repo().find_admin_by_email(email).await
    }

    // Projects

    pub async fn list_projects(&self) -> Result<Vec<Project>> {
        self.project_repo().list().await
    }

    pub async fn count_projects(&self) -> Result<u64> {
        self.project_repo().count().await
    }

    pub async fn project_name_exists(&self, name: &str) -> Result<bool> {
        self.project_repo().name_exists(name).await
    }

    pub async fn create_project(&self, project: NewProject) -> Result<Project> {
        self.project_repo().create(project).await
    }

    // Leave requests

    pub async fn get_leave_request(&self, id: i32) -> Result<Option<LeaveRequest>> {
        self.leave_repo().get(id).await
    }

    pub async fn create_leave_request(&self, request: NewLeaveRequest) -> Result<LeaveRequest> {
        self.leave_repo().create(request).await
    }

    /// Pending requests across all users.
    pub async fn count_pending_leave(&self) -> Result<u64> {
        self.leave_repo().count_pending().await
    }

    pub async fn decide_leave_request(
        &self,
        id: i32,
        approve: bool,
        reviewer_id: i32,
    ) -> Result<bool> {
        self.leave_repo().decide(id, approve, reviewer_id).await
    }
}
