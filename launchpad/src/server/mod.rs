//! Read-only operator HTTP endpoint

pub mod handlers;
pub mod serve;
pub mod state;
