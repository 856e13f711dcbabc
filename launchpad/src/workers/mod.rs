//! Background workers

pub mod monitor;
pub mod recovery;
