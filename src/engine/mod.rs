//! Core engine — the submit → preconfirm → finalize feed loop.
//!
//! [`feed::FeedCore`] is the deterministic state machine; [`live`] runs it
//! on tokio time and publishes snapshots to readers.

pub mod sampler;
pub mod schedule;
pub mod feed;
pub mod stats;
pub mod live;

pub use feed::{FeedCore, FeedEvent};
pub use live::{FeedSnapshot, LiveFeedEngine, Subscription};
pub use sampler::{RandomSampler, Sampler};
pub use stats::FeedStats;
