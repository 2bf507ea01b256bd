//! Role-derived permission flags
//!
//! The flags only decide which actions are offered. The backend's
//! row-level security is the actual enforcer.

use serde::{Deserialize, Serialize};

use crate::backend::{fetch_all, AuthUser, Backend, Query};
use crate::model::{AppRole, Table, UserRole};
use crate::Result;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    pub can_export: bool,
    pub can_delete: bool,
    pub can_create_campaign: bool,
    pub can_manage_users: bool,
    pub can_view_audit_log: bool,
}

impl Permissions {
    pub fn for_role(role: AppRole) -> Self {
        match role {
            AppRole::Admin => Self {
                can_export: true,
                can_delete: true,
                can_create_campaign: true,
                can_manage_users: true,
                can_view_audit_log: true,
            },
            AppRole::Manager => Self {
                can_manage_users: false,
                ..Self::for_role(AppRole::Admin)
            },
            AppRole::SalesRep => Self::default(),
        }
    }

    /// Flags of the most privileged role held; no roles means sales rep
    pub fn for_roles(roles: &[AppRole]) -> Self {
        let role = roles.iter().copied().max().unwrap_or(AppRole::SalesRep);
        Self::for_role(role)
    }
}

/// Signed-in user with roles and derived permissions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserContext {
    pub user: AuthUser,
    pub roles: Vec<AppRole>,
    pub permissions: Permissions,
}

impl UserContext {
    pub fn new(user: AuthUser, mut roles: Vec<AppRole>) -> Self {
        roles.sort();
        roles.dedup();
        let permissions = Permissions::for_roles(&roles);
        Self {
            user,
            roles,
            permissions,
        }
    }

    /// Fetch the user's role rows
    pub async fn load(backend: &dyn Backend, user: AuthUser) -> Result<Self> {
        let query = Query::new().eq("user_id", user.id.to_string());
        let rows = fetch_all::<UserRole>(backend, Table::UserRoles, &query).await?;
        Ok(Self::new(user, rows.into_iter().map(|r| r.role).collect()))
    }
}
