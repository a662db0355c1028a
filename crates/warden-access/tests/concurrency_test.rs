//! Registry operations racing each other on one tenant.
//!
//! Outcomes may differ run to run; what must hold is that every failure
//! is a caller-facing kind and the stored state stays consistent with
//! the successes.

use std::sync::Arc;

use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;
use warden_access::{AccessConfig, MembershipRegistry, TenantRegistry};
use warden_core::error::{ErrorKind, WardenResult};
use warden_core::models::membership::{InviteMember, MembershipStatus};
use warden_core::models::tenant::{CreateTenant, TenantStatus};
use warden_core::repository::Pagination;
use warden_db::repository::{
    SurrealMembershipRepository, SurrealRoleRepository, SurrealTenantRepository,
    SurrealUserDirectory,
};

type Members = MembershipRegistry<
    SurrealMembershipRepository<Db>,
    SurrealTenantRepository<Db>,
    SurrealRoleRepository<Db>,
    SurrealUserDirectory<Db>,
>;

struct Fixture {
    tenants: TenantRegistry<SurrealTenantRepository<Db>>,
    members: Members,
    tenant_id: Uuid,
}

async fn setup() -> Arc<Fixture> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    warden_db::run_migrations(&db).await.unwrap();

    let config = AccessConfig::default();
    let tenants = TenantRegistry::new(SurrealTenantRepository::new(db.clone()), config.clone());
    let tenant = tenants
        .create_tenant(CreateTenant {
            name: "Acme".into(),
            slug: "acme".into(),
            domain: "acme.example.com".into(),
        })
        .await
        .unwrap();

    Arc::new(Fixture {
        tenants,
        members: MembershipRegistry::new(
            SurrealMembershipRepository::new(db.clone()),
            SurrealTenantRepository::new(db.clone()),
            SurrealRoleRepository::new(db.clone()),
            SurrealUserDirectory::new(db),
            config,
        ),
        tenant_id: tenant.id,
    })
}

fn invite(tenant_id: Uuid, email: &str) -> InviteMember {
    InviteMember {
        tenant_id,
        email: email.into(),
        role_slugs: vec![],
    }
}

fn assert_kind<T>(result: &WardenResult<T>, allowed: &[ErrorKind]) {
    if let Err(err) = result {
        assert!(
            allowed.contains(&err.kind()),
            "unexpected {:?} error: {err}",
            err.kind()
        );
    }
}

async fn member_count(fx: &Fixture) -> u64 {
    fx.members
        .list_memberships(fx.tenant_id, Pagination::default())
        .await
        .unwrap()
        .total
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_invites_into_one_tenant() {
    let fx = setup().await;

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let fx = Arc::clone(&fx);
            tokio::spawn(async move {
                fx.members
                    .invite_member(invite(fx.tenant_id, &format!("user{i}@acme.com")))
                    .await
            })
        })
        .collect();

    let mut invited = Vec::new();
    for handle in handles {
        let result = handle.await.unwrap();
        assert_kind(&result, &[ErrorKind::Conflict]);
        if let Ok(membership) = result {
            assert_eq!(membership.status, MembershipStatus::Pending);
            invited.push(membership.id);
        }
    }

    assert!(!invited.is_empty());
    assert_eq!(member_count(&fx).await, invited.len() as u64);
    for id in invited {
        assert_eq!(fx.members.get_membership(id).await.unwrap().tenant_id, fx.tenant_id);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn duplicate_concurrent_invites_keep_one_membership() {
    let fx = setup().await;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let fx = Arc::clone(&fx);
            tokio::spawn(async move {
                fx.members
                    .invite_member(invite(fx.tenant_id, "ada@acme.com"))
                    .await
            })
        })
        .collect();

    let mut winners = 0;
    for handle in handles {
        let result = handle.await.unwrap();
        assert_kind(&result, &[ErrorKind::Conflict]);
        winners += usize::from(result.is_ok());
    }

    assert_eq!(winners, 1);
    assert_eq!(member_count(&fx).await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn invites_racing_tenant_deletion() {
    let fx = setup().await;

    let invites: Vec<_> = (0..8)
        .map(|i| {
            let fx = Arc::clone(&fx);
            tokio::spawn(async move {
                fx.members
                    .invite_member(invite(fx.tenant_id, &format!("user{i}@acme.com")))
                    .await
            })
        })
        .collect();
    let delete = {
        let fx = Arc::clone(&fx);
        tokio::spawn(async move { fx.tenants.delete_tenant(fx.tenant_id).await })
    };

    let mut invited = 0u64;
    for handle in invites {
        let result = handle.await.unwrap();
        assert_kind(&result, &[ErrorKind::NotFound, ErrorKind::Conflict]);
        invited += u64::from(result.is_ok());
    }
    let deleted = delete.await.unwrap();
    assert_kind(&deleted, &[ErrorKind::Conflict]);

    let tenant = fx.tenants.get_tenant(fx.tenant_id).await.unwrap();
    let expected = if deleted.is_ok() {
        TenantStatus::Deleted
    } else {
        TenantStatus::Active
    };
    assert_eq!(tenant.status, expected);
    assert_eq!(member_count(&fx).await, invited);

    // Once deletion has committed nothing more can join.
    if deleted.is_ok() {
        let late = fx
            .members
            .invite_member(invite(fx.tenant_id, "late@acme.com"))
            .await
            .unwrap_err();
        assert_eq!(late.kind(), ErrorKind::NotFound);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_suspend_and_activate() {
    let fx = setup().await;

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let fx = Arc::clone(&fx);
            tokio::spawn(async move {
                let suspend = i % 2 == 0;
                let result = if suspend {
                    fx.tenants.suspend_tenant(fx.tenant_id).await
                } else {
                    fx.tenants.activate_tenant(fx.tenant_id).await
                };
                (suspend, result)
            })
        })
        .collect();

    let (mut suspends, mut activates) = (0i64, 0i64);
    for handle in handles {
        let (suspend, result) = handle.await.unwrap();
        assert_kind(&result, &[ErrorKind::InvalidState, ErrorKind::Conflict]);
        if result.is_ok() {
            if suspend {
                suspends += 1;
            } else {
                activates += 1;
            }
        }
    }

    // Each success flips the status, starting from active.
    let tenant = fx.tenants.get_tenant(fx.tenant_id).await.unwrap();
    match suspends - activates {
        0 => assert_eq!(tenant.status, TenantStatus::Active),
        1 => assert_eq!(tenant.status, TenantStatus::Suspended),
        other => panic!("unbalanced transitions: {other}"),
    }
}
