//! Feed tracking and delivery engine.
//!
//! This module contains the snapshot/delivery contracts, their HTTP and
//! Telegram implementations, the delta detector and the poll scheduler.

pub mod delta;
pub mod fetcher;
pub mod scheduler;
pub mod source;
pub mod telegram;
pub mod types;

pub use delta::{detect, Delta, DEFAULT_CATCH_UP_LIMIT};
pub use fetcher::{parse_feed, validate_url, HttpFeedSource};
pub use scheduler::{
    start_poll_scheduler, CycleReport, PollOutcome, PollScheduler, SchedulerHandle,
    DEFAULT_MAX_CONCURRENT, DEFAULT_POLL_INTERVAL_SECS,
};
pub use source::{DeliverySink, SnapshotSource};
pub use telegram::{format_message, TelegramSink};
pub use types::{FeedEntry, Notification};
