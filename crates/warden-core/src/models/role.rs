//! Role domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::permission::Permission;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub id: Uuid,
    /// `None` marks a global role usable from every tenant.
    pub tenant_id: Option<Uuid>,
    pub name: String,
    /// Unique within the role's scope.
    pub slug: String,
    pub permissions: Vec<Permission>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Role {
    pub fn is_global(&self) -> bool {
        self.tenant_id.is_none()
    }

    /// Whether a membership in `tenant_id` may hold this role.
    pub fn usable_in(&self, tenant_id: Uuid) -> bool {
        self.tenant_id.is_none_or(|scope| scope == tenant_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRole {
    pub tenant_id: Option<Uuid>,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub permission_ids: Vec<Uuid>,
}

/// Key under which role slugs must be unique.
pub fn scope_key(tenant_id: Option<Uuid>) -> String {
    match tenant_id {
        Some(id) => id.to_string(),
        None => "global".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role(tenant_id: Option<Uuid>) -> Role {
        Role {
            id: Uuid::new_v4(),
            tenant_id,
            name: "Member".into(),
            slug: "member".into(),
            permissions: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn global_roles_are_usable_everywhere() {
        let global = role(None);
        assert!(global.is_global());
        assert!(global.usable_in(Uuid::new_v4()));
    }

    #[test]
    fn tenant_roles_stay_in_their_tenant() {
        let tenant = Uuid::new_v4();
        let local = role(Some(tenant));
        assert!(local.usable_in(tenant));
        assert!(!local.usable_in(Uuid::new_v4()));
    }

    #[test]
    fn scope_keys_distinguish_global() {
        let id = Uuid::new_v4();
        assert_eq!(scope_key(None), "global");
        assert_eq!(scope_key(Some(id)), id.to_string());
    }
}
