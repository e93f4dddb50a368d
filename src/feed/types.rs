//! Feed types for feedrelay.

/// One entry of a feed snapshot.
///
/// Entries are ephemeral; only the `entry_id` of the newest delivered entry
/// is ever persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    /// Unique identifier within the feed (the entry's link).
    pub entry_id: String,
    /// Entry title.
    pub title: String,
    /// Publication timestamp as reported by the feed, passed through verbatim.
    pub published_at: String,
}

impl FeedEntry {
    /// Create a new entry.
    pub fn new(
        entry_id: impl Into<String>,
        title: impl Into<String>,
        published_at: impl Into<String>,
    ) -> Self {
        Self {
            entry_id: entry_id.into(),
            title: title.into(),
            published_at: published_at.into(),
        }
    }
}

/// A single entry addressed to a destination on behalf of a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// The entry being delivered.
    pub entry: FeedEntry,
    /// Title of the subscription the entry came from.
    pub subscription_title: String,
}

impl Notification {
    /// Create a new notification.
    pub fn new(entry: FeedEntry, subscription_title: impl Into<String>) -> Self {
        Self {
            entry,
            subscription_title: subscription_title.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_entry_new() {
        let entry = FeedEntry::new("https://e.x/1", "Hello", "2025-01-01T00:00:00+00:00");
        assert_eq!(entry.entry_id, "https://e.x/1");
        assert_eq!(entry.title, "Hello");
        assert_eq!(entry.published_at, "2025-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_notification_new() {
        let entry = FeedEntry::new("https://e.x/1", "Hello", "");
        let n = Notification::new(entry.clone(), "news");
        assert_eq!(n.entry, entry);
        assert_eq!(n.subscription_title, "news");
    }
}
