//! Warden: administrative command line for the access-control core.

mod cli;
mod seed;

use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;
use surrealdb::{Connection, Surreal};
use tracing_subscriber::EnvFilter;
use warden_access::{
    AccessConfig, AccessEvaluator, Envelope, MembershipRegistry, RoleStore, TenantRegistry,
};
use warden_core::access::PermissionCheck;
use warden_core::error::WardenResult;
use warden_core::models::membership::{AssignRoles, InviteMember};
use warden_core::models::role::CreateRole;
use warden_core::models::tenant::{AddDomain, CreateTenant};
use warden_core::repository::Pagination;
use warden_db::repository::{
    SurrealMembershipRepository, SurrealPermissionRepository, SurrealRoleRepository,
    SurrealTenantRepository, SurrealUserDirectory,
};
use warden_db::{DbConfig, DbManager};

use crate::cli::{Cli, Command, LogFormat, MemberCommand, RoleCommand, TenantCommand};

fn init_tracing(format: LogFormat) -> anyhow::Result<()> {
    let filter = EnvFilter::from_default_env().add_directive("warden=info".parse()?);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
    Ok(())
}

/// Print the envelope on stdout and report whether the call succeeded.
fn emit<T: Serialize>(result: WardenResult<T>) -> anyhow::Result<bool> {
    let envelope = Envelope::from(result);
    println!("{}", serde_json::to_string_pretty(&envelope)?);
    Ok(envelope.success)
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.log_format)?;

    let manager = DbManager::open(&DbConfig::from(cli.db)).await?;

    if matches!(cli.command, Command::Migrate) {
        tracing::info!(
            endpoint = %manager.endpoint(),
            schema_version = manager.schema_version(),
            "Schema is current"
        );
        return Ok(ExitCode::SUCCESS);
    }

    let ok = run(manager.client().clone(), AccessConfig::from(cli.access), cli.command).await?;
    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

async fn run<C: Connection>(
    db: Surreal<C>,
    config: AccessConfig,
    command: Command,
) -> anyhow::Result<bool> {
    let tenants = TenantRegistry::new(SurrealTenantRepository::new(db.clone()), config.clone());
    let roles = RoleStore::new(
        SurrealRoleRepository::new(db.clone()),
        SurrealPermissionRepository::new(db.clone()),
    );
    let members = MembershipRegistry::new(
        SurrealMembershipRepository::new(db.clone()),
        SurrealTenantRepository::new(db.clone()),
        SurrealRoleRepository::new(db.clone()),
        SurrealUserDirectory::new(db.clone()),
        config,
    );
    let evaluator = AccessEvaluator::new(
        SurrealTenantRepository::new(db.clone()),
        SurrealMembershipRepository::new(db),
    );

    match command {
        Command::Migrate => Ok(true),
        Command::Seed { file } => {
            let catalog = seed::Catalog::load(&file)?;
            emit(seed::apply(&roles, catalog).await)
        }

        Command::Tenant { action } => match action {
            TenantCommand::Create { name, slug, domain } => emit(
                tenants
                    .create_tenant(CreateTenant { name, slug, domain })
                    .await,
            ),
            TenantCommand::Activate { id } => emit(tenants.activate_tenant(id).await),
            TenantCommand::Suspend { id } => emit(tenants.suspend_tenant(id).await),
            TenantCommand::Delete { id } => emit(tenants.delete_tenant(id).await),
            TenantCommand::AddDomain {
                id,
                hostname,
                primary,
            } => emit(
                tenants
                    .add_domain(
                        id,
                        AddDomain {
                            hostname,
                            is_primary: primary,
                        },
                    )
                    .await,
            ),
            TenantCommand::Get { id } => emit(tenants.get_tenant(id).await),
            TenantCommand::Resolve { hostname } => {
                emit(tenants.resolve_tenant_by_host(&hostname).await)
            }
            TenantCommand::List {
                status,
                offset,
                limit,
            } => emit(
                tenants
                    .list_tenants(status, Pagination { offset, limit })
                    .await,
            ),
        },

        Command::Role { action } => match action {
            RoleCommand::Create {
                tenant,
                name,
                slug,
                permissions,
            } => {
                let result = async {
                    let mut permission_ids = Vec::with_capacity(permissions.len());
                    for slug in &permissions {
                        permission_ids.push(roles.get_permission_by_slug(slug).await?.id);
                    }
                    roles
                        .create_role(CreateRole {
                            tenant_id: tenant,
                            name,
                            slug,
                            permission_ids,
                        })
                        .await
                }
                .await;
                emit(result)
            }
            RoleCommand::List { tenant } => emit(roles.list_roles(tenant).await),
            RoleCommand::Get { id } => emit(roles.get_role(id).await),
            RoleCommand::Permissions => emit(roles.list_permissions().await),
        },

        Command::Member { action } => match action {
            MemberCommand::Invite {
                tenant,
                email,
                roles: role_slugs,
            } => emit(
                members
                    .invite_member(InviteMember {
                        tenant_id: tenant,
                        email,
                        role_slugs,
                    })
                    .await,
            ),
            MemberCommand::Activate { id } => emit(members.activate_membership(id).await),
            MemberCommand::Revoke { id } => emit(members.revoke_membership(id).await),
            MemberCommand::Assign { id, roles: role_ids } => emit(
                members
                    .assign_roles_to_member(id, AssignRoles { role_ids })
                    .await,
            ),
            MemberCommand::Get { id } => emit(members.get_membership(id).await),
            MemberCommand::List {
                tenant,
                offset,
                limit,
            } => emit(
                members
                    .list_memberships(tenant, Pagination { offset, limit })
                    .await,
            ),
        },

        Command::Check {
            tenant,
            user,
            permission,
        } => emit(
            evaluator
                .check_permission(&PermissionCheck {
                    tenant_id: tenant,
                    user_id: user,
                    permission,
                })
                .await,
        ),
        Command::Effective { tenant, user } => {
            emit(evaluator.effective_permissions(tenant, user).await)
        }
    }
}
