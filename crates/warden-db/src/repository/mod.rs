//! SurrealDB repository implementations.

mod directory;
mod membership;
mod permission;
mod role;
mod tenant;
mod tx;

pub use directory::SurrealUserDirectory;
pub use membership::SurrealMembershipRepository;
pub use permission::SurrealPermissionRepository;
pub use role::SurrealRoleRepository;
pub use tenant::SurrealTenantRepository;
