//! Delta detection.
//!
//! Turns a freshly fetched snapshot (newest first) and the last delivered
//! marker into the entries that still need delivering, oldest first.
//!
//! When the marker is absent (never delivered) or no longer present in the
//! snapshot (the feed rotated past it), only the newest `catch_up_limit`
//! entries are taken. With the default limit of one this delivers a single
//! entry instead of flooding the destination with the whole visible window.

use super::types::FeedEntry;

/// Default number of entries delivered when there is no usable marker.
pub const DEFAULT_CATCH_UP_LIMIT: usize = 1;

/// Result of comparing a snapshot against a marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delta {
    /// Entries to deliver, oldest first.
    pub new_entries: Vec<FeedEntry>,
    /// Marker to persist: the newest collected entry, or the input marker
    /// when nothing was collected.
    pub marker: Option<String>,
}

impl Delta {
    /// Whether there is nothing to deliver.
    pub fn is_empty(&self) -> bool {
        self.new_entries.is_empty()
    }

    /// Number of entries to deliver.
    pub fn len(&self) -> usize {
        self.new_entries.len()
    }
}

/// Compute the unseen entries of `snapshot`.
///
/// `snapshot` must be ordered newest first. A `catch_up_limit` of zero is
/// treated as one.
pub fn detect(snapshot: &[FeedEntry], last_seen: Option<&str>, catch_up_limit: usize) -> Delta {
    let matched = last_seen.and_then(|marker| snapshot.iter().position(|e| e.entry_id == marker));

    let fresh = match matched {
        Some(index) => &snapshot[..index],
        None => &snapshot[..catch_up_limit.max(1).min(snapshot.len())],
    };

    let marker = match fresh.first() {
        Some(newest) => Some(newest.entry_id.clone()),
        None => last_seen.map(str::to_string),
    };

    Delta {
        new_entries: fresh.iter().rev().cloned().collect(),
        marker,
    }
}
