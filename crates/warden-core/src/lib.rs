//! Warden Core: domain models, lifecycle rules, and repository traits
//! for the multi-tenant access-control core.
//!
//! This crate performs no I/O. Storage lives behind the traits in
//! [`repository`]; the registries and evaluator in `warden-access`
//! drive them.

pub mod access;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod repository;
pub mod validation;

pub use error::{ErrorKind, WardenError, WardenResult};
