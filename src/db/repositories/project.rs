use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};

use crate::entities::projects;

pub type Project = projects::Model;

#[derive(Debug, Clone)]
pub struct NewProject {
    pub name: String,
    pub description: String,
    pub manager_id: Option<i32>,
}

pub struct ProjectRepository {
    conn: DatabaseConnection,
}

impl ProjectRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn list(&self) -> Result<Vec<Project>> {
        projects::Entity::find()
            .order_by_asc(projects::Column::Name)
            .all(&self.conn)
            .await
            .context("Failed to list projects")
    }

    pub async fn count(&self) -> Result<u64> {
        projects::Entity::find()
            .count(&self.conn)
            .await
            .context("Failed to count projects")
    }

    pub async fn name_exists(&self, name: &str) -> Result<bool> {
        let count = projects::Entity::find()
            .filter(projects::Column::Name.eq(name))
            .count(&self.conn)
            .await
            .context("Failed to query project by name")?;

        Ok(count > 0)
    }

    pub async fn create(&self, project: NewProject) -> Result<Project> {
        let active = projects::ActiveModel {
            name: Set(project.name),
            description: Set(project.description),
            status: Set("planned".to_string()),
            manager_id: Set(project.manager_id),
            created_at: Set(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        };

        active
            .insert(&self.conn)
            .await
            .context("Failed to insert project")
    }
}
