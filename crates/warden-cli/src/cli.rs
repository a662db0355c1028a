//! Command line definitions.

use clap::{Args, Parser, Subcommand, ValueEnum};
use uuid::Uuid;
use warden_access::AccessConfig;
use warden_core::models::tenant::TenantStatus;
use warden_db::DbConfig;

/// Administer tenants, memberships and roles, and answer permission checks.
#[derive(Parser, Debug)]
#[command(name = "warden", author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub db: DbArgs,

    #[command(flatten)]
    pub access: AccessArgs,

    /// Log output format.
    #[arg(long, env = "WARDEN_LOG_FORMAT", default_value = "pretty")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug)]
pub struct DbArgs {
    /// SurrealDB server address (`ws://host:port`, `host:port`) or `mem://`
    /// for a throwaway in-memory store.
    #[arg(long = "db-url", env = "WARDEN_DB_URL", default_value = "ws://127.0.0.1:8000")]
    pub url: String,

    #[arg(long = "db-namespace", env = "WARDEN_DB_NAMESPACE", default_value = "warden")]
    pub namespace: String,

    #[arg(long = "db-database", env = "WARDEN_DB_DATABASE", default_value = "main")]
    pub database: String,

    #[arg(long = "db-username", env = "WARDEN_DB_USERNAME", default_value = "root")]
    pub username: String,

    #[arg(
        long = "db-password",
        env = "WARDEN_DB_PASSWORD",
        default_value = "root",
        hide_env_values = true
    )]
    pub password: String,
}

impl From<DbArgs> for DbConfig {
    fn from(args: DbArgs) -> Self {
        DbConfig {
            url: args.url,
            namespace: args.namespace,
            database: args.database,
            username: args.username,
            password: args.password,
        }
    }
}

#[derive(Args, Debug)]
pub struct AccessArgs {
    /// Fail instead of succeeding when revoking a revoked membership.
    #[arg(long, env = "WARDEN_STRICT_REVOKE")]
    pub strict_revoke: bool,

    /// Fail instead of succeeding when deleting a deleted tenant.
    #[arg(long, env = "WARDEN_STRICT_DELETE")]
    pub strict_delete: bool,

    /// Compare-and-swap retries for status changes.
    #[arg(long, env = "WARDEN_MAX_TRANSITION_RETRIES", default_value_t = 3)]
    pub max_transition_retries: u32,

    /// Prefix for allocated tenant schema names.
    #[arg(long, env = "WARDEN_SCHEMA_PREFIX", default_value = "tenant_")]
    pub schema_prefix: String,
}

impl From<AccessArgs> for AccessConfig {
    fn from(args: AccessArgs) -> Self {
        AccessConfig {
            idempotent_revoke: !args.strict_revoke,
            idempotent_delete: !args.strict_delete,
            max_transition_retries: args.max_transition_retries,
            schema_prefix: args.schema_prefix,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Apply pending schema migrations.
    Migrate,

    /// Register permissions and global roles from a TOML catalog.
    Seed {
        /// Path to the catalog file.
        file: std::path::PathBuf,
    },

    /// Manage tenants and their domains.
    Tenant {
        #[command(subcommand)]
        action: TenantCommand,
    },

    /// Manage roles and the permission catalog.
    Role {
        #[command(subcommand)]
        action: RoleCommand,
    },

    /// Manage memberships.
    Member {
        #[command(subcommand)]
        action: MemberCommand,
    },

    /// Check whether a user holds a permission in a tenant.
    Check {
        #[arg(long)]
        tenant: Uuid,
        #[arg(long)]
        user: Uuid,
        permission: String,
    },

    /// List the permissions a user holds in a tenant.
    Effective {
        #[arg(long)]
        tenant: Uuid,
        #[arg(long)]
        user: Uuid,
    },
}

#[derive(Subcommand, Debug)]
pub enum TenantCommand {
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        slug: String,
        /// Primary domain hostname.
        #[arg(long)]
        domain: String,
    },
    Activate {
        id: Uuid,
    },
    Suspend {
        id: Uuid,
    },
    Delete {
        id: Uuid,
    },
    AddDomain {
        id: Uuid,
        hostname: String,
        /// Make this the tenant's primary domain.
        #[arg(long)]
        primary: bool,
    },
    Get {
        id: Uuid,
    },
    /// Resolve a tenant from one of its hostnames.
    Resolve {
        hostname: String,
    },
    List {
        #[arg(long)]
        status: Option<TenantStatus>,
        #[arg(long, default_value_t = 0)]
        offset: u64,
        #[arg(long, default_value_t = 50)]
        limit: u64,
    },
}

#[derive(Subcommand, Debug)]
pub enum RoleCommand {
    Create {
        /// Owning tenant; omit for a global role.
        #[arg(long)]
        tenant: Option<Uuid>,
        #[arg(long)]
        name: String,
        #[arg(long)]
        slug: String,
        /// Permission slug to grant (repeatable).
        #[arg(long = "permission")]
        permissions: Vec<String>,
    },
    /// Tenant roles followed by global roles.
    List {
        #[arg(long)]
        tenant: Uuid,
    },
    Get {
        id: Uuid,
    },
    Permissions,
}

#[derive(Subcommand, Debug)]
pub enum MemberCommand {
    Invite {
        #[arg(long)]
        tenant: Uuid,
        #[arg(long)]
        email: String,
        /// Role slug to attach (repeatable).
        #[arg(long = "role")]
        roles: Vec<String>,
    },
    Activate {
        id: Uuid,
    },
    Revoke {
        id: Uuid,
    },
    /// Replace the membership's roles with exactly these ids.
    Assign {
        id: Uuid,
        #[arg(long = "role")]
        roles: Vec<Uuid>,
    },
    Get {
        id: Uuid,
    },
    List {
        #[arg(long)]
        tenant: Uuid,
        #[arg(long, default_value_t = 0)]
        offset: u64,
        #[arg(long, default_value_t = 50)]
        limit: u64,
    },
}
