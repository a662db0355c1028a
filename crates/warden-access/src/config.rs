//! Access-control configuration.

/// Configuration shared by the registries.
#[derive(Debug, Clone)]
pub struct AccessConfig {
    /// Treat revoking an already-revoked membership as a no-op success.
    /// When `false` the repeat fails with `InvalidState`.
    pub idempotent_revoke: bool,
    /// Same for deleting an already-deleted tenant.
    pub idempotent_delete: bool,
    /// Compare-and-swap attempts for a status change before giving up
    /// with `Conflict` (default: 3).
    pub max_transition_retries: u32,
    /// Prefix for allocated tenant schema names (default: `tenant_`).
    pub schema_prefix: String,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            idempotent_revoke: true,
            idempotent_delete: true,
            max_transition_retries: 3,
            schema_prefix: "tenant_".into(),
        }
    }
}
