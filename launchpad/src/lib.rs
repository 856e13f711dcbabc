//! launchpad library
//!
//! Deployment orchestration and recovery: project detection, the deployment
//! state machine, execution, monitoring and failure recovery.

pub mod app;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod http;
pub mod integrations;
pub mod logs;
pub mod models;
pub mod recovery;
pub mod server;
pub mod storage;
pub mod store;
pub mod utils;
pub mod workers;
