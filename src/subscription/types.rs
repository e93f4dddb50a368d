//! Subscription types for feedrelay.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::feed::FeedEntry;
use crate::{RelayError, Result};

/// Maximum length of a subscription title.
pub const MAX_TITLE_LENGTH: usize = 64;

/// A subscribed feed and its delivery position.
#[derive(Debug, Clone, PartialEq)]
pub struct Subscription {
    /// Row ID (insertion order).
    pub id: i64,
    /// Unique, user-chosen title.
    pub title: String,
    /// Feed address.
    pub source: String,
    /// Destination override; the configured default is used when `None`.
    pub destination: Option<String>,
    /// Entry ID of the most recently delivered entry.
    pub last_seen: Option<String>,
    /// When the subscription was created.
    pub created_at: DateTime<Utc>,
    /// When the subscription was last updated.
    pub updated_at: DateTime<Utc>,
}

/// New subscription for creation.
#[derive(Debug, Clone)]
pub struct NewSubscription {
    /// Unique title.
    pub title: String,
    /// Feed address.
    pub source: String,
    /// Destination override.
    pub destination: Option<String>,
    /// Initial marker.
    pub last_seen: Option<String>,
}

impl NewSubscription {
    /// Create a new subscription without destination or marker.
    pub fn new(title: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            source: source.into(),
            destination: None,
            last_seen: None,
        }
    }

    /// Set the destination.
    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    /// Set the initial marker.
    pub fn with_last_seen(mut self, last_seen: impl Into<String>) -> Self {
        self.last_seen = Some(last_seen.into());
        self
    }
}

/// Which marker a freshly added subscription starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedPolicy {
    /// Record the newest entry as already seen; nothing is delivered until
    /// the feed publishes something newer.
    #[default]
    MarkLatest,
    /// Leave the marker empty so the first poll delivers the newest entry.
    DeliverLatest,
}

impl SeedPolicy {
    /// Marker to store for a subscription whose feed currently reports `snapshot`.
    pub fn initial_marker(&self, snapshot: &[FeedEntry]) -> Option<String> {
        match self {
            SeedPolicy::MarkLatest => snapshot.first().map(|e| e.entry_id.clone()),
            SeedPolicy::DeliverLatest => None,
        }
    }
}

/// Validate a subscription title.
///
/// Titles are single words so they can be used as command arguments.
pub fn validate_title(title: &str) -> Result<()> {
    if title.is_empty() {
        return Err(RelayError::Validation("title must not be empty".to_string()));
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(RelayError::Validation(format!(
            "title must be at most {} characters",
            MAX_TITLE_LENGTH
        )));
    }
    if title.chars().any(char::is_whitespace) {
        return Err(RelayError::Validation(
            "title must be a single word".to_string(),
        ));
    }
    Ok(())
}
