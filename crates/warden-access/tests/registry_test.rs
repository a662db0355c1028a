//! Integration tests for the tenant, role and membership registries
//! using in-memory SurrealDB.

use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;
use warden_access::{AccessConfig, MembershipRegistry, RoleStore, TenantRegistry};
use warden_core::error::WardenError;
use warden_core::models::membership::{AssignRoles, InviteMember, MembershipStatus};
use warden_core::models::permission::CreatePermission;
use warden_core::models::role::CreateRole;
use warden_core::models::tenant::{AddDomain, CreateTenant, Tenant, TenantStatus};
use warden_core::repository::Pagination;
use warden_db::repository::{
    SurrealMembershipRepository, SurrealPermissionRepository, SurrealRoleRepository,
    SurrealTenantRepository, SurrealUserDirectory,
};

type Members = MembershipRegistry<
    SurrealMembershipRepository<Db>,
    SurrealTenantRepository<Db>,
    SurrealRoleRepository<Db>,
    SurrealUserDirectory<Db>,
>;

struct Fixture {
    tenants: TenantRegistry<SurrealTenantRepository<Db>>,
    roles: RoleStore<SurrealRoleRepository<Db>, SurrealPermissionRepository<Db>>,
    members: Members,
}

async fn setup_with(config: AccessConfig) -> Fixture {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    warden_db::run_migrations(&db).await.unwrap();

    Fixture {
        tenants: TenantRegistry::new(SurrealTenantRepository::new(db.clone()), config.clone()),
        roles: RoleStore::new(
            SurrealRoleRepository::new(db.clone()),
            SurrealPermissionRepository::new(db.clone()),
        ),
        members: MembershipRegistry::new(
            SurrealMembershipRepository::new(db.clone()),
            SurrealTenantRepository::new(db.clone()),
            SurrealRoleRepository::new(db.clone()),
            SurrealUserDirectory::new(db),
            config,
        ),
    }
}

async fn setup() -> Fixture {
    setup_with(AccessConfig::default()).await
}

async fn tenant(fx: &Fixture, slug: &str) -> Tenant {
    fx.tenants
        .create_tenant(CreateTenant {
            name: slug.into(),
            slug: slug.into(),
            domain: format!("{slug}.example.com"),
        })
        .await
        .unwrap()
}

async fn role(fx: &Fixture, tenant_id: Option<Uuid>, slug: &str) -> Uuid {
    fx.roles
        .create_role(CreateRole {
            tenant_id,
            name: slug.into(),
            slug: slug.into(),
            permission_ids: vec![],
        })
        .await
        .unwrap()
        .id
}

fn invite(tenant_id: Uuid, email: &str, roles: &[&str]) -> InviteMember {
    InviteMember {
        tenant_id,
        email: email.into(),
        role_slugs: roles.iter().map(|s| s.to_string()).collect(),
    }
}

// ---------------------------------------------------------------------------
// Tenants
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_tenant_normalizes_and_allocates_schema() {
    let fx = setup().await;

    let tenant = fx
        .tenants
        .create_tenant(CreateTenant {
            name: " Acme Corp ".into(),
            slug: "Acme Corp".into(),
            domain: "Acme.Example.com.".into(),
        })
        .await
        .unwrap();

    assert_eq!(tenant.name, "Acme Corp");
    assert_eq!(tenant.slug, "acme-corp");
    assert_eq!(tenant.schema_name, "tenant_acme_corp");
    assert_eq!(tenant.status, TenantStatus::Active);
    assert_eq!(tenant.primary_domain().unwrap().hostname, "acme.example.com");
}

#[tokio::test]
async fn create_tenant_rejects_malformed_input() {
    let fx = setup().await;

    let err = fx
        .tenants
        .create_tenant(CreateTenant {
            name: "Acme".into(),
            slug: "acme!".into(),
            domain: "acme.example.com".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, WardenError::InvalidArgument { .. }), "got {err:?}");
}

#[tokio::test]
async fn duplicate_slug_or_domain_is_conflict() {
    let fx = setup().await;
    tenant(&fx, "acme").await;

    let same_slug = fx
        .tenants
        .create_tenant(CreateTenant {
            name: "Acme 2".into(),
            slug: "ACME".into(),
            domain: "acme2.example.com".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(same_slug, WardenError::Conflict { .. }));

    let same_domain = fx
        .tenants
        .create_tenant(CreateTenant {
            name: "Globex".into(),
            slug: "globex".into(),
            domain: "acme.example.com".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(same_domain, WardenError::Conflict { .. }));
}

#[tokio::test]
async fn tenant_lifecycle_follows_state_machine() {
    let fx = setup().await;
    let acme = tenant(&fx, "acme").await;

    let err = fx.tenants.activate_tenant(acme.id).await.unwrap_err();
    assert!(matches!(err, WardenError::InvalidState { .. }), "active cannot activate");

    let suspended = fx.tenants.suspend_tenant(acme.id).await.unwrap();
    assert_eq!(suspended.status, TenantStatus::Suspended);

    let err = fx.tenants.suspend_tenant(acme.id).await.unwrap_err();
    assert!(matches!(err, WardenError::InvalidState { .. }));

    let active = fx.tenants.activate_tenant(acme.id).await.unwrap();
    assert_eq!(active.status, TenantStatus::Active);

    let deleted = fx.tenants.delete_tenant(acme.id).await.unwrap();
    assert_eq!(deleted.status, TenantStatus::Deleted);

    for result in [
        fx.tenants.activate_tenant(acme.id).await,
        fx.tenants.suspend_tenant(acme.id).await,
    ] {
        assert!(matches!(result, Err(WardenError::InvalidState { .. })));
    }
}

#[tokio::test]
async fn delete_tenant_twice_is_a_no_op() {
    let fx = setup().await;
    let acme = tenant(&fx, "acme").await;

    fx.tenants.delete_tenant(acme.id).await.unwrap();
    let again = fx.tenants.delete_tenant(acme.id).await.unwrap();
    assert_eq!(again.status, TenantStatus::Deleted);
}

#[tokio::test]
async fn strict_delete_rejects_repeat() {
    let fx = setup_with(AccessConfig {
        idempotent_delete: false,
        ..AccessConfig::default()
    })
    .await;
    let acme = tenant(&fx, "acme").await;

    fx.tenants.delete_tenant(acme.id).await.unwrap();
    let err = fx.tenants.delete_tenant(acme.id).await.unwrap_err();
    assert!(matches!(err, WardenError::InvalidState { .. }), "got {err:?}");
}

#[tokio::test]
async fn transitions_on_unknown_tenant_are_not_found() {
    let fx = setup().await;

    let err = fx.tenants.delete_tenant(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, WardenError::NotFound { .. }));

    let err = fx.tenants.delete_tenant(Uuid::nil()).await.unwrap_err();
    assert!(matches!(err, WardenError::InvalidArgument { .. }));
}

#[tokio::test]
async fn primary_domain_stays_unique() {
    let fx = setup().await;
    let acme = tenant(&fx, "acme").await;

    fx.tenants
        .add_domain(
            acme.id,
            AddDomain {
                hostname: "ACME.io".into(),
                is_primary: true,
            },
        )
        .await
        .unwrap();
    fx.tenants
        .add_domain(
            acme.id,
            AddDomain {
                hostname: "acme.dev".into(),
                is_primary: false,
            },
        )
        .await
        .unwrap();

    let domains = fx.tenants.list_domains(acme.id).await.unwrap();
    assert_eq!(domains.len(), 3);
    let primaries: Vec<_> = domains.iter().filter(|d| d.is_primary).collect();
    assert_eq!(primaries.len(), 1);
    assert_eq!(primaries[0].hostname, "acme.io");

    let resolved = fx.tenants.resolve_tenant_by_host("Acme.Dev").await.unwrap();
    assert_eq!(resolved.id, acme.id);
}

#[tokio::test]
async fn list_tenants_by_status() {
    let fx = setup().await;
    tenant(&fx, "alpha").await;
    let bravo = tenant(&fx, "bravo").await;
    fx.tenants.suspend_tenant(bravo.id).await.unwrap();

    let suspended = fx
        .tenants
        .list_tenants(Some(TenantStatus::Suspended), Pagination::default())
        .await
        .unwrap();
    assert_eq!(suspended.total, 1);
    assert_eq!(suspended.items[0].id, bravo.id);

    let all = fx
        .tenants
        .list_tenants(None, Pagination::default())
        .await
        .unwrap();
    assert_eq!(all.total, 2);
    assert_eq!(fx.tenants.get_tenant_by_slug("Bravo").await.unwrap().id, bravo.id);
}

// ---------------------------------------------------------------------------
// Roles & permissions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_role_resolves_permissions() {
    let fx = setup().await;
    let acme = tenant(&fx, "acme").await;
    let read = fx
        .roles
        .register_permission(CreatePermission {
            name: "Read catalog".into(),
            slug: "Catalog.Read".into(),
        })
        .await
        .unwrap();
    assert_eq!(read.slug, "catalog.read");

    let member = fx
        .roles
        .create_role(CreateRole {
            tenant_id: Some(acme.id),
            name: "Member".into(),
            slug: "member".into(),
            permission_ids: vec![read.id, read.id],
        })
        .await
        .unwrap();
    assert_eq!(member.permissions.len(), 1);
    assert_eq!(member.permissions[0].slug, "catalog.read");

    let fetched = fx.roles.get_role(member.id).await.unwrap();
    assert_eq!(fetched.permissions[0].id, read.id);
    assert_eq!(
        fx.roles.get_permission_by_slug("catalog.read").await.unwrap().id,
        read.id
    );
}

#[tokio::test]
async fn create_role_with_unknown_permission_is_not_found() {
    let fx = setup().await;
    let acme = tenant(&fx, "acme").await;

    let err = fx
        .roles
        .create_role(CreateRole {
            tenant_id: Some(acme.id),
            name: "Member".into(),
            slug: "member".into(),
            permission_ids: vec![Uuid::new_v4()],
        })
        .await
        .unwrap_err();
    assert!(matches!(err, WardenError::NotFound { .. }), "got {err:?}");
    assert!(fx.roles.list_roles(acme.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn duplicate_role_slug_in_tenant_is_conflict() {
    let fx = setup().await;
    let acme = tenant(&fx, "acme").await;
    role(&fx, Some(acme.id), "member").await;

    let err = fx
        .roles
        .create_role(CreateRole {
            tenant_id: Some(acme.id),
            name: "Member again".into(),
            slug: "Member".into(),
            permission_ids: vec![],
        })
        .await
        .unwrap_err();
    assert!(matches!(err, WardenError::Conflict { .. }), "got {err:?}");
}

#[tokio::test]
async fn list_roles_merges_tenant_and_global() {
    let fx = setup().await;
    let acme = tenant(&fx, "acme").await;
    let other = tenant(&fx, "other").await;
    role(&fx, Some(acme.id), "member").await;
    role(&fx, Some(other.id), "outsider").await;
    role(&fx, None, "auditor").await;

    let roles = fx.roles.list_roles(acme.id).await.unwrap();
    let slugs: Vec<_> = roles.iter().map(|r| r.slug.as_str()).collect();
    assert_eq!(slugs, ["member", "auditor"]);
}

// ---------------------------------------------------------------------------
// Memberships
// ---------------------------------------------------------------------------

#[tokio::test]
async fn invite_creates_pending_membership_with_roles() {
    let fx = setup().await;
    let acme = tenant(&fx, "acme").await;
    role(&fx, Some(acme.id), "member").await;
    role(&fx, None, "auditor").await;

    let membership = fx
        .members
        .invite_member(invite(acme.id, "Bob@Acme.com", &["member", "auditor"]))
        .await
        .unwrap();

    assert_eq!(membership.status, MembershipStatus::Pending);
    assert_eq!(membership.email, "bob@acme.com");
    assert_eq!(membership.roles.len(), 2);

    let page = fx
        .members
        .list_memberships(acme.id, Pagination::default())
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].roles.len(), 2);
}

#[tokio::test]
async fn invite_with_unknown_role_is_not_found() {
    let fx = setup().await;
    let acme = tenant(&fx, "acme").await;

    let err = fx
        .members
        .invite_member(invite(acme.id, "bob@acme.com", &["ghost"]))
        .await
        .unwrap_err();
    assert!(matches!(err, WardenError::NotFound { .. }), "got {err:?}");
}

#[tokio::test]
async fn invite_cannot_use_another_tenants_role() {
    let fx = setup().await;
    let acme = tenant(&fx, "acme").await;
    let other = tenant(&fx, "other").await;
    role(&fx, Some(other.id), "outsider").await;

    let err = fx
        .members
        .invite_member(invite(acme.id, "bob@acme.com", &["outsider"]))
        .await
        .unwrap_err();
    assert!(matches!(err, WardenError::NotFound { .. }), "got {err:?}");
}

#[tokio::test]
async fn invite_into_deleted_or_missing_tenant_is_not_found() {
    let fx = setup().await;
    let acme = tenant(&fx, "acme").await;
    fx.tenants.delete_tenant(acme.id).await.unwrap();

    for tenant_id in [acme.id, Uuid::new_v4()] {
        let err = fx
            .members
            .invite_member(invite(tenant_id, "bob@acme.com", &[]))
            .await
            .unwrap_err();
        assert!(matches!(err, WardenError::NotFound { .. }), "got {err:?}");
    }
}

#[tokio::test]
async fn duplicate_invite_is_conflict() {
    let fx = setup().await;
    let acme = tenant(&fx, "acme").await;
    fx.members
        .invite_member(invite(acme.id, "bob@acme.com", &[]))
        .await
        .unwrap();

    let err = fx
        .members
        .invite_member(invite(acme.id, "BOB@acme.com", &[]))
        .await
        .unwrap_err();
    assert!(matches!(err, WardenError::Conflict { .. }), "got {err:?}");
}

#[tokio::test]
async fn reinvite_after_revoke_supersedes_old_membership() {
    let fx = setup().await;
    let acme = tenant(&fx, "acme").await;
    let old = fx
        .members
        .invite_member(invite(acme.id, "bob@acme.com", &[]))
        .await
        .unwrap();
    fx.members.revoke_membership(old.id).await.unwrap();

    let fresh = fx
        .members
        .invite_member(invite(acme.id, "bob@acme.com", &[]))
        .await
        .unwrap();
    assert_ne!(fresh.id, old.id);
    assert_eq!(fresh.user_id, old.user_id);

    let live = fx
        .members
        .get_membership_for_user(acme.id, old.user_id)
        .await
        .unwrap();
    assert_eq!(live.id, fresh.id);
    assert_eq!(
        fx.members.get_membership(old.id).await.unwrap().status,
        MembershipStatus::Revoked
    );
}

#[tokio::test]
async fn membership_lifecycle_and_idempotent_revoke() {
    let fx = setup().await;
    let acme = tenant(&fx, "acme").await;
    let membership = fx
        .members
        .invite_member(invite(acme.id, "bob@acme.com", &[]))
        .await
        .unwrap();

    let active = fx.members.activate_membership(membership.id).await.unwrap();
    assert_eq!(active.status, MembershipStatus::Active);

    let err = fx.members.activate_membership(membership.id).await.unwrap_err();
    assert!(matches!(err, WardenError::InvalidState { .. }));

    let revoked = fx.members.revoke_membership(membership.id).await.unwrap();
    assert_eq!(revoked.status, MembershipStatus::Revoked);
    let again = fx.members.revoke_membership(membership.id).await.unwrap();
    assert_eq!(again.status, MembershipStatus::Revoked);

    let err = fx.members.activate_membership(membership.id).await.unwrap_err();
    assert!(matches!(err, WardenError::InvalidState { .. }));
}

#[tokio::test]
async fn strict_revoke_rejects_repeat() {
    let fx = setup_with(AccessConfig {
        idempotent_revoke: false,
        ..AccessConfig::default()
    })
    .await;
    let acme = tenant(&fx, "acme").await;
    let membership = fx
        .members
        .invite_member(invite(acme.id, "bob@acme.com", &[]))
        .await
        .unwrap();

    fx.members.revoke_membership(membership.id).await.unwrap();
    let err = fx.members.revoke_membership(membership.id).await.unwrap_err();
    assert!(matches!(err, WardenError::InvalidState { .. }), "got {err:?}");
}

#[tokio::test]
async fn assign_roles_replaces_the_set() {
    let fx = setup().await;
    let acme = tenant(&fx, "acme").await;
    role(&fx, Some(acme.id), "member").await;
    let editor = role(&fx, Some(acme.id), "editor").await;
    let auditor = role(&fx, None, "auditor").await;
    let membership = fx
        .members
        .invite_member(invite(acme.id, "bob@acme.com", &["member"]))
        .await
        .unwrap();

    let updated = fx
        .members
        .assign_roles_to_member(
            membership.id,
            AssignRoles {
                role_ids: vec![editor, auditor],
            },
        )
        .await
        .unwrap();

    let mut ids = updated.role_ids();
    ids.sort();
    let mut expected = vec![editor, auditor];
    expected.sort();
    assert_eq!(ids, expected);
}

#[tokio::test]
async fn assign_foreign_role_is_cross_scope() {
    let fx = setup().await;
    let acme = tenant(&fx, "acme").await;
    let other = tenant(&fx, "other").await;
    let outsider = role(&fx, Some(other.id), "outsider").await;
    let membership = fx
        .members
        .invite_member(invite(acme.id, "bob@acme.com", &[]))
        .await
        .unwrap();

    let err = fx
        .members
        .assign_roles_to_member(
            membership.id,
            AssignRoles {
                role_ids: vec![outsider],
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WardenError::CrossScope { .. }), "got {err:?}");

    let err = fx
        .members
        .assign_roles_to_member(
            membership.id,
            AssignRoles {
                role_ids: vec![Uuid::new_v4()],
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WardenError::NotFound { .. }), "got {err:?}");
}

#[tokio::test]
async fn assign_roles_to_revoked_membership_is_invalid_state() {
    let fx = setup().await;
    let acme = tenant(&fx, "acme").await;
    let member = role(&fx, Some(acme.id), "member").await;
    let membership = fx
        .members
        .invite_member(invite(acme.id, "bob@acme.com", &[]))
        .await
        .unwrap();
    fx.members.revoke_membership(membership.id).await.unwrap();

    let err = fx
        .members
        .assign_roles_to_member(
            membership.id,
            AssignRoles {
                role_ids: vec![member],
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WardenError::InvalidState { .. }), "got {err:?}");
}
