//! Subscription management service for feedrelay.
//!
//! This is the surface a command layer (chat bot, CLI) calls to register,
//! inspect and remove subscriptions.

use tracing::info;

use super::lock::SubscriptionLocks;
use super::repository::SubscriptionRepository;
use super::types::{validate_title, NewSubscription, SeedPolicy, Subscription};
use crate::db::Database;
use crate::feed::SnapshotSource;
use crate::{RelayError, Result};

/// Service for subscription management.
pub struct SubscriptionService<'a> {
    db: &'a Database,
    source: &'a dyn SnapshotSource,
    locks: &'a SubscriptionLocks,
    seed: SeedPolicy,
}

impl<'a> SubscriptionService<'a> {
    /// Create a new service.
    ///
    /// `locks` must be the table shared with the running poll scheduler.
    pub fn new(
        db: &'a Database,
        source: &'a dyn SnapshotSource,
        locks: &'a SubscriptionLocks,
    ) -> Self {
        Self {
            db,
            source,
            locks,
            seed: SeedPolicy::default(),
        }
    }

    /// Set the seed policy applied to new subscriptions.
    pub fn with_seed_policy(mut self, seed: SeedPolicy) -> Self {
        self.seed = seed;
        self
    }

    /// Subscribe to a feed.
    ///
    /// The source is fetched first and must report at least one entry.
    ///
    /// # Errors
    ///
    /// - `Validation` if the title is malformed or the feed has no entries
    /// - `DuplicateTitle` if the title is already in use
    /// - `Fetch` if the source cannot be fetched or parsed
    pub async fn add(
        &self,
        title: &str,
        source: &str,
        destination: Option<&str>,
    ) -> Result<Subscription> {
        validate_title(title)?;
        if source.trim().is_empty() {
            return Err(RelayError::Validation("source must not be empty".to_string()));
        }

        let _guard = self.locks.lock(title).await;
        let repo = SubscriptionRepository::new(self.db.pool());

        // Reject early so a duplicate does not cost a fetch
        if repo.find(title).await?.is_some() {
            return Err(RelayError::DuplicateTitle(title.to_string()));
        }

        let snapshot = self.source.fetch(source).await?;
        if snapshot.is_empty() {
            return Err(RelayError::Validation(format!(
                "{} does not look like a feed: no entries",
                source
            )));
        }

        let mut new_sub = NewSubscription::new(title, source);
        if let Some(destination) = destination {
            new_sub = new_sub.with_destination(destination);
        }
        if let Some(marker) = self.seed.initial_marker(&snapshot) {
            new_sub = new_sub.with_last_seen(marker);
        }

        let subscription = repo.add(&new_sub).await?;
        info!(
            "Added subscription '{}' ({}), seed {:?}",
            subscription.title, subscription.source, self.seed
        );
        Ok(subscription)
    }

    /// Unsubscribe.
    pub async fn remove(&self, title: &str) -> Result<()> {
        let result = {
            let _guard = self.locks.lock(title).await;
            SubscriptionRepository::new(self.db.pool())
                .remove(title)
                .await
        };
        self.locks.forget(title);
        result?;
        info!("Removed subscription '{}'", title);
        Ok(())
    }

    /// Get a subscription by title.
    pub async fn get(&self, title: &str) -> Result<Subscription> {
        SubscriptionRepository::new(self.db.pool()).get(title).await
    }

    /// List all subscriptions in insertion order.
    pub async fn list(&self) -> Result<Vec<Subscription>> {
        SubscriptionRepository::new(self.db.pool()).list().await
    }
}
