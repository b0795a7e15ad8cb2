use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Fixed role set. Stored as its snake_case name.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[sea_orm(string_value = "admin")]
    Admin,
    #[sea_orm(string_value = "programme_manager")]
    ProgrammeManager,
    #[sea_orm(string_value = "project_manager")]
    ProjectManager,
    #[sea_orm(string_value = "staff")]
    Staff,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::ProgrammeManager => "programme_manager",
            Self::ProjectManager => "project_manager",
            Self::Staff => "staff",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Lower-cased on write so lookups can compare exactly.
    #[sea_orm(unique)]
    pub email: String,

    pub full_name: String,

    /// Argon2id PHC string
    pub password_hash: String,

    pub role: Role,

    pub active: bool,

    /// Forces password rotation on first login/bootstrap.
    pub must_change_password: bool,

    pub created_at: String,

    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
