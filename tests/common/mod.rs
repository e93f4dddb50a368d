//! Test helpers for poll scheduler integration tests.
//!
//! Provides an in-memory snapshot source and a recording delivery sink.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use feedrelay::{
    Database, DeliverySink, FeedEntry, NewSubscription, Notification, RelayError, Result,
    SnapshotSource, Subscription, SubscriptionRepository,
};

/// Build an entry whose ID is a link under `https://feed.test/`.
pub fn entry(id: &str) -> FeedEntry {
    FeedEntry::new(
        format!("https://feed.test/{id}"),
        format!("Post {id}"),
        "2025-01-01T00:00:00+00:00",
    )
}

/// Link of the entry built by [`entry`].
pub fn link(id: &str) -> String {
    format!("https://feed.test/{id}")
}

/// A fetch that blocks until released.
pub struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

/// Snapshot source serving scripted feeds.
#[derive(Default)]
pub struct FakeSource {
    feeds: Mutex<HashMap<String, Vec<FeedEntry>>>,
    failing: Mutex<HashSet<String>>,
    gates: Mutex<HashMap<String, Arc<Gate>>>,
    fetches: Mutex<Vec<String>>,
}

impl FakeSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Set the snapshot of `source`; `ids` are newest first.
    pub fn set(&self, source: &str, ids: &[&str]) {
        let entries = ids.iter().map(|id| entry(id)).collect();
        self.feeds.lock().unwrap().insert(source.to_string(), entries);
    }

    /// Publish a new entry at the head of `source`.
    pub fn publish(&self, source: &str, id: &str) {
        self.feeds
            .lock()
            .unwrap()
            .entry(source.to_string())
            .or_default()
            .insert(0, entry(id));
    }

    /// Make fetches of `source` fail (or succeed again).
    pub fn set_failing(&self, source: &str, failing: bool) {
        let mut set = self.failing.lock().unwrap();
        if failing {
            set.insert(source.to_string());
        } else {
            set.remove(source);
        }
    }

    /// Make the next fetches of `source` wait on the returned gate.
    pub fn gate(&self, source: &str) -> Arc<Gate> {
        let gate = Arc::new(Gate {
            entered: Notify::new(),
            release: Notify::new(),
        });
        self.gates
            .lock()
            .unwrap()
            .insert(source.to_string(), Arc::clone(&gate));
        gate
    }

    pub fn fetch_count(&self, source: &str) -> usize {
        self.fetches
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.as_str() == source)
            .count()
    }
}

#[async_trait]
impl SnapshotSource for FakeSource {
    async fn fetch(&self, source: &str) -> Result<Vec<FeedEntry>> {
        self.fetches.lock().unwrap().push(source.to_string());

        let gate = self.gates.lock().unwrap().get(source).cloned();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        if self.failing.lock().unwrap().contains(source) {
            return Err(RelayError::Fetch(format!("timed out fetching {source}")));
        }
        Ok(self
            .feeds
            .lock()
            .unwrap()
            .get(source)
            .cloned()
            .unwrap_or_default())
    }
}

/// One delivered notification.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub destination: String,
    pub subscription: String,
    pub entry_id: String,
}

/// Delivery sink recording every successful send.
#[derive(Default)]
pub struct RecordingSink {
    delivered: Mutex<Vec<Delivery>>,
    rejected: Mutex<HashSet<String>>,
    attempts: Mutex<usize>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Reject sends of the entry with this link.
    pub fn reject(&self, entry_id: &str) {
        self.rejected.lock().unwrap().insert(entry_id.to_string());
    }

    pub fn delivered(&self) -> Vec<Delivery> {
        self.delivered.lock().unwrap().clone()
    }

    /// Entry links delivered for `subscription`, in delivery order.
    pub fn delivered_for(&self, subscription: &str) -> Vec<String> {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.subscription == subscription)
            .map(|d| d.entry_id.clone())
            .collect()
    }

    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap()
    }
}

#[async_trait]
impl DeliverySink for RecordingSink {
    async fn send(&self, destination: &str, notification: &Notification) -> Result<()> {
        *self.attempts.lock().unwrap() += 1;
        if self
            .rejected
            .lock()
            .unwrap()
            .contains(&notification.entry.entry_id)
        {
            return Err(RelayError::Send("Bad Request: message is too long".to_string()));
        }
        self.delivered.lock().unwrap().push(Delivery {
            destination: destination.to_string(),
            subscription: notification.subscription_title.clone(),
            entry_id: notification.entry.entry_id.clone(),
        });
        Ok(())
    }
}

/// Add a subscription directly through the store.
pub async fn subscribe(
    db: &Database,
    title: &str,
    source: &str,
    last_seen: Option<&str>,
) -> Subscription {
    let mut new_sub = NewSubscription::new(title, source);
    if let Some(marker) = last_seen {
        new_sub = new_sub.with_last_seen(link(marker));
    }
    SubscriptionRepository::new(db.pool())
        .add(&new_sub)
        .await
        .unwrap()
}

/// Current marker of a subscription.
pub async fn marker(db: &Database, title: &str) -> Option<String> {
    SubscriptionRepository::new(db.pool())
        .get(title)
        .await
        .unwrap()
        .last_seen
}
