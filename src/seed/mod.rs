//! Idempotent reference data: roles, the super admin, locations and default settings.

pub mod data;
pub mod runner;

pub use runner::{run, SeedOptions, SeedReport};
