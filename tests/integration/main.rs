//! Integration tests for the live feed.
//!
//! Drives the public API only: the deterministic core on a hand-stepped
//! clock, and the live engine on tokio's paused clock.

mod scripted_sampler;
mod feed_lifecycle;
mod live_engine;
