//! Role-based access control.
//!
//! Permission resolution has two layers. The forced-change gate comes first:
//! a user who must change their password holds `ChangeOwnPassword` and
//! nothing else. Only then is the role table consulted.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::AuthError;
use crate::db::User;
use crate::entities::users::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ViewDashboard,
    ViewProjects,
    ManageProjects,
    ManageUsers,
    SubmitLeave,
    ApproveLeave,
    ManageSite,
    ChangeOwnPassword,
}

impl Permission {
    pub const ALL: [Self; 8] = [
        Self::ViewDashboard,
        Self::ViewProjects,
        Self::ManageProjects,
        Self::ManageUsers,
        Self::SubmitLeave,
        Self::ApproveLeave,
        Self::ManageSite,
        Self::ChangeOwnPassword,
    ];
}

/// Where a logged-in user sits in the credential lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Active,
    ForcedChange,
}

impl SessionState {
    #[must_use]
    pub const fn for_user(user: &User) -> Self {
        if user.must_change_password {
            Self::ForcedChange
        } else {
            Self::Active
        }
    }
}

/// Identity attached to every request by the session middleware.
#[derive(Debug, Clone)]
pub enum AuthContext {
    Anonymous {
        /// Why a presented token was not accepted, if one was presented.
        reason: Option<AuthError>,
    },
    Authenticated {
        user: User,
        state: SessionState,
    },
}

impl AuthContext {
    #[must_use]
    pub const fn anonymous() -> Self {
        Self::Anonymous { reason: None }
    }

    #[must_use]
    pub const fn rejected(reason: AuthError) -> Self {
        Self::Anonymous {
            reason: Some(reason),
        }
    }

    #[must_use]
    pub fn authenticated(user: User) -> Self {
        let state = SessionState::for_user(&user);
        Self::Authenticated { user, state }
    }

    #[must_use]
    pub const fn user(&self) -> Option<&User> {
        match self {
            Self::Authenticated { user, .. } => Some(user),
            Self::Anonymous { .. } => None,
        }
    }

    #[must_use]
    pub const fn state(&self) -> Option<SessionState> {
        match self {
            Self::Authenticated { state, .. } => Some(*state),
            Self::Anonymous { .. } => None,
        }
    }
}

/// Immutable role → permission table.
#[derive(Debug, Clone)]
pub struct RolePermissions {
    grants: HashMap<Role, HashSet<Permission>>,
}

impl RolePermissions {
    #[must_use]
    pub fn standard() -> Self {
        use Permission::{
            ApproveLeave, ChangeOwnPassword, ManageProjects, ManageSite, ManageUsers, SubmitLeave,
            ViewDashboard, ViewProjects,
        };

        let everyone = [ViewDashboard, ViewProjects, SubmitLeave, ChangeOwnPassword];
        let managers = [ManageProjects, ManageUsers];

        let mut grants: HashMap<Role, HashSet<Permission>> = HashMap::new();
        grants.insert(Role::Staff, everyone.into_iter().collect());
        grants.insert(
            Role::ProjectManager,
            everyone.into_iter().chain(managers).collect(),
        );
        grants.insert(
            Role::ProgrammeManager,
            everyone
                .into_iter()
                .chain(managers)
                .chain([ApproveLeave])
                .collect(),
        );
        grants.insert(Role::Admin, Permission::ALL.into_iter().collect());

        Self { grants }
    }

    #[must_use]
    pub fn grants(&self, role: Role, permission: Permission) -> bool {
        self.grants
            .get(&role)
            .is_some_and(|set| set.contains(&permission))
    }

    #[must_use]
    pub fn permissions_for(&self, role: Role) -> Vec<Permission> {
        let mut permissions: Vec<Permission> = self
            .grants
            .get(&role)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        permissions.sort_unstable();
        permissions
    }
}

impl Default for RolePermissions {
    fn default() -> Self {
        Self::standard()
    }
}

/// Which roles a role may create, delete or reset.
#[must_use]
pub const fn can_manage(actor: Role, target: Role) -> bool {
    match actor {
        Role::Admin => true,
        Role::ProgrammeManager => matches!(target, Role::ProjectManager | Role::Staff),
        Role::ProjectManager => matches!(target, Role::Staff),
        Role::Staff => false,
    }
}

#[derive(Debug, Clone)]
pub struct RbacGuard {
    table: Arc<RolePermissions>,
}

impl RbacGuard {
    #[must_use]
    pub const fn new(table: Arc<RolePermissions>) -> Self {
        Self { table }
    }

    /// Check `permission` for the request identity. Call before doing anything
    /// with side effects.
    pub fn require_permission(
        &self,
        context: &AuthContext,
        permission: Permission,
    ) -> Result<(), AuthError> {
        self.require_user(context, permission).map(|_| ())
    }

    /// Same check as `require_permission`, handing back the acting user.
    pub fn require_user<'a>(
        &self,
        context: &'a AuthContext,
        permission: Permission,
    ) -> Result<&'a User, AuthError> {
        let result = match context {
            AuthContext::Anonymous { .. } => Err(AuthError::Unauthorized),
            AuthContext::Authenticated { user, state } => {
                if self.allows(user.role, *state, permission) {
                    Ok(user)
                } else {
                    Err(AuthError::Forbidden)
                }
            }
        };

        if let Err(e) = &result {
            metrics::counter!("auth_guard_denied_total", "reason" => e.metric_label())
                .increment(1);
            tracing::debug!(?permission, reason = e.metric_label(), "Permission denied");
        }

        result
    }

    /// Permissions the identity actually holds right now.
    #[must_use]
    pub fn effective_permissions(&self, context: &AuthContext) -> Vec<Permission> {
        match context {
            AuthContext::Anonymous { .. } => Vec::new(),
            AuthContext::Authenticated {
                state: SessionState::ForcedChange,
                ..
            } => vec![Permission::ChangeOwnPassword],
            AuthContext::Authenticated { user, .. } => self.table.permissions_for(user.role),
        }
    }

    fn allows(&self, role: Role, state: SessionState, permission: Permission) -> bool {
        match state {
            SessionState::ForcedChange => permission == Permission::ChangeOwnPassword,
            SessionState::Active => self.table.grants(role, permission),
        }
    }
}

impl Default for RbacGuard {
    fn default() -> Self {
        Self::new(Arc::new(RolePermissions::standard()))
    }
}
