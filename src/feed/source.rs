//! Collaborator contracts used by the poll scheduler.

use async_trait::async_trait;

use super::types::{FeedEntry, Notification};
use crate::Result;

/// Produces the current snapshot of a feed.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Fetch the entries `source` currently reports, newest first.
    ///
    /// Any failure, including a timeout, is reported as `RelayError::Fetch`.
    async fn fetch(&self, source: &str) -> Result<Vec<FeedEntry>>;
}

/// Delivers notifications to a destination.
#[async_trait]
pub trait DeliverySink: Send + Sync {
    /// Send one notification. Failures are reported as `RelayError::Send`.
    async fn send(&self, destination: &str, notification: &Notification) -> Result<()>;
}
