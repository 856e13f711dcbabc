//! Collaborator interfaces: repository lookup and event notification

pub mod directory;
pub mod notify;
