//! Domain models for warden.
//!
//! These are the core types shared across all crates.

pub mod membership;
pub mod permission;
pub mod role;
pub mod tenant;
