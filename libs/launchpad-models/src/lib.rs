//! Shared projection types for launchpad and its collaborators.

pub mod models;

pub use models::*;
