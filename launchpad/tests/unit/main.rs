//! Integration tests for launchpad

mod support;
mod test_fsm;
mod test_pipeline;
mod test_recovery;
mod test_server;
mod test_vercel;
