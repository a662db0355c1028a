//! Permission catalog and global role seeding from TOML.
//!
//! ```toml
//! [[permissions]]
//! slug = "catalog.read"
//! name = "Read catalog"
//!
//! [[roles]]
//! slug = "auditor"
//! name = "Auditor"
//! permissions = ["catalog.read"]
//! ```
//!
//! Seeding is repeatable: entries that already exist are skipped.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::info;
use warden_access::RoleStore;
use warden_core::error::{WardenError, WardenResult};
use warden_core::models::permission::CreatePermission;
use warden_core::models::role::CreateRole;
use warden_core::repository::{PermissionRepository, RoleRepository};

#[derive(Debug, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub permissions: Vec<PermissionEntry>,
    #[serde(default)]
    pub roles: Vec<RoleEntry>,
}

#[derive(Debug, Deserialize)]
pub struct PermissionEntry {
    pub slug: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct RoleEntry {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// What a seeding run changed.
#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct SeedReport {
    pub permissions_created: Vec<String>,
    pub roles_created: Vec<String>,
    pub skipped: Vec<String>,
}

impl Catalog {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading catalog {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing catalog {}", path.display()))
    }
}

pub async fn apply<R, P>(store: &RoleStore<R, P>, catalog: Catalog) -> WardenResult<SeedReport>
where
    R: RoleRepository,
    P: PermissionRepository,
{
    let mut report = SeedReport::default();

    for entry in catalog.permissions {
        match store
            .register_permission(CreatePermission {
                name: entry.name,
                slug: entry.slug.clone(),
            })
            .await
        {
            Ok(permission) => report.permissions_created.push(permission.slug),
            Err(WardenError::Conflict { .. }) => {
                report.skipped.push(format!("permission:{}", entry.slug))
            }
            Err(e) => return Err(e),
        }
    }

    for entry in catalog.roles {
        let mut permission_ids = Vec::with_capacity(entry.permissions.len());
        for slug in &entry.permissions {
            permission_ids.push(store.get_permission_by_slug(slug).await?.id);
        }

        match store
            .create_role(CreateRole {
                tenant_id: None,
                name: entry.name,
                slug: entry.slug.clone(),
                permission_ids,
            })
            .await
        {
            Ok(role) => report.roles_created.push(role.slug),
            Err(WardenError::Conflict { .. }) => report.skipped.push(format!("role:{}", entry.slug)),
            Err(e) => return Err(e),
        }
    }

    info!(
        permissions = report.permissions_created.len(),
        roles = report.roles_created.len(),
        skipped = report.skipped.len(),
        "Catalog seeded"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_catalog_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[[permissions]]
slug = "catalog.read"
name = "Read catalog"

[[roles]]
slug = "auditor"
name = "Auditor"
permissions = ["catalog.read"]
"#
        )
        .unwrap();

        let catalog = Catalog::load(file.path()).unwrap();
        assert_eq!(catalog.permissions.len(), 1);
        assert_eq!(catalog.permissions[0].slug, "catalog.read");
        assert_eq!(catalog.roles[0].permissions, ["catalog.read"]);
    }

    #[test]
    fn missing_sections_default_to_empty() {
        let catalog: Catalog = toml::from_str("").unwrap();
        assert!(catalog.permissions.is_empty());
        assert!(catalog.roles.is_empty());
    }

    #[test]
    fn malformed_catalog_names_the_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[[permissions]]\nslug = 1\n").unwrap();

        let err = Catalog::load(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("parsing catalog"));
    }
}
