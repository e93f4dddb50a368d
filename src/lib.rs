//! feedrelay - forwards new entries of subscribed web feeds to a chat channel.
//!
//! Each subscription remembers the last entry it delivered. A poll scheduler
//! periodically fetches every feed, works out which entries are newer than
//! that marker, records the new marker and delivers the entries oldest first.

pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod logging;
pub mod subscription;

pub use config::Config;
pub use db::Database;
pub use error::{RelayError, Result};
pub use feed::{
    detect, start_poll_scheduler, CycleReport, Delta, DeliverySink, FeedEntry, HttpFeedSource,
    Notification, PollOutcome, PollScheduler, SchedulerHandle, SnapshotSource, TelegramSink,
};
pub use subscription::{
    NewSubscription, SeedPolicy, Subscription, SubscriptionLocks, SubscriptionRepository,
    SubscriptionService,
};
