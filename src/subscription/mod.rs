//! Subscription store for feedrelay.
//!
//! A subscription binds a feed source to a destination and remembers the
//! last entry delivered from it.

pub mod lock;
pub mod repository;
pub mod service;
pub mod types;

pub use lock::SubscriptionLocks;
pub use repository::SubscriptionRepository;
pub use service::SubscriptionService;
pub use types::{validate_title, NewSubscription, SeedPolicy, Subscription, MAX_TITLE_LENGTH};
