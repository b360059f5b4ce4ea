//! PRECONF FEED — live preconfirmation feed simulator
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod engine;
pub mod simulator;
pub mod dashboard;
