//! Deployment module

pub mod backend;
pub mod config;
pub mod detector;
pub mod dispatcher;
pub mod executor;
pub mod fsm;
pub mod lifecycle;
pub mod monitor;
pub mod platform;
pub mod service;
pub mod source;
