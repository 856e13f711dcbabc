//! Failure classification and recovery policy

pub mod analyzer;
pub mod health;
pub mod service;
