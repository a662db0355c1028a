//! Warden Access: the registries and evaluator that apply lifecycle
//! rules on top of the repository traits in `warden-core`.
//!
//! Every service is generic over its repositories, so this crate has no
//! dependency on the database crate.

pub mod config;
pub mod envelope;
pub mod evaluator;
pub mod membership;
pub mod role;
pub mod tenant;

pub use config::AccessConfig;
pub use envelope::Envelope;
pub use evaluator::AccessEvaluator;
pub use membership::MembershipRegistry;
pub use role::RoleStore;
pub use tenant::TenantRegistry;
