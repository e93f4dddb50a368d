//! Poll scheduler for feedrelay.
//!
//! Once per interval the scheduler walks every subscription and, for each
//! one, fetches the feed, detects unseen entries, advances the stored marker
//! and then delivers the entries oldest first. Subscriptions are processed
//! independently, up to `max_concurrent` at a time; a failure in one never
//! affects another, and nothing short of shutdown stops the loop.
//!
//! The marker is persisted before delivery. If persisting fails nothing is
//! delivered and the whole batch is retried next cycle. If a send fails the
//! marker has already moved past that entry and it is not resent, which
//! favours no duplicates over guaranteed delivery.
//!
//! The marker write is a compare-and-set against the row read at the start of
//! the poll. Add and remove may run in another process with its own lock
//! table, so a row removed or replaced mid-poll is detected there and its
//! batch dropped.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::delta::{detect, DEFAULT_CATCH_UP_LIMIT};
use super::source::{DeliverySink, SnapshotSource};
use super::types::Notification;
use crate::config::PollConfig;
use crate::db::Database;
use crate::subscription::{Subscription, SubscriptionLocks, SubscriptionRepository};
use crate::RelayError;

/// Default poll interval in seconds.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;

/// Default number of subscriptions processed concurrently.
pub const DEFAULT_MAX_CONCURRENT: usize = 4;

/// Shortest accepted poll interval.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// What happened to one subscription during a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Nothing new.
    UpToDate,
    /// New entries were found; the marker advanced and delivery was attempted.
    Delivered {
        /// Entries detected as new.
        found: usize,
        /// Entries the sink accepted.
        sent: usize,
        /// Entries the sink rejected.
        failed: usize,
    },
    /// The feed could not be fetched; retried next cycle.
    FetchFailed(String),
    /// The store could not be read or the marker could not be advanced;
    /// nothing was delivered and the batch is retried next cycle.
    PersistFailed(String),
    /// Neither the subscription nor the configuration names a destination.
    NoDestination,
    /// The subscription was removed, or replaced under the same title,
    /// before its marker could be advanced. Nothing was delivered.
    Removed,
    /// Shutdown was requested before the subscription was started.
    Skipped,
}

/// Outcomes of one poll cycle.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    /// Outcome per subscription title, in completion order.
    pub outcomes: Vec<(String, PollOutcome)>,
}

impl CycleReport {
    /// Outcome for a subscription, if it was part of the cycle.
    pub fn outcome(&self, title: &str) -> Option<&PollOutcome> {
        self.outcomes
            .iter()
            .find(|(t, _)| t == title)
            .map(|(_, outcome)| outcome)
    }

    /// Total entries accepted by the sink.
    pub fn sent(&self) -> usize {
        self.outcomes
            .iter()
            .map(|(_, outcome)| match outcome {
                PollOutcome::Delivered { sent, .. } => *sent,
                _ => 0,
            })
            .sum()
    }

    /// Number of subscriptions that hit an error of any kind.
    pub fn failures(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| match outcome {
                PollOutcome::Delivered { failed, .. } => *failed > 0,
                PollOutcome::FetchFailed(_)
                | PollOutcome::PersistFailed(_)
                | PollOutcome::NoDestination => true,
                _ => false,
            })
            .count()
    }
}

/// Periodic driver of fetch, detect, persist and deliver.
pub struct PollScheduler {
    db: Arc<Database>,
    source: Arc<dyn SnapshotSource>,
    sink: Arc<dyn DeliverySink>,
    locks: SubscriptionLocks,
    interval: Duration,
    max_concurrent: usize,
    catch_up_limit: usize,
    default_destination: Option<String>,
}

impl PollScheduler {
    /// Create a scheduler with default settings.
    pub fn new(
        db: Arc<Database>,
        source: Arc<dyn SnapshotSource>,
        sink: Arc<dyn DeliverySink>,
    ) -> Self {
        Self {
            db,
            source,
            sink,
            locks: SubscriptionLocks::new(),
            interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            catch_up_limit: DEFAULT_CATCH_UP_LIMIT,
            default_destination: None,
        }
    }

    /// Apply interval, concurrency and catch-up settings.
    pub fn with_config(mut self, config: &PollConfig) -> Self {
        self.interval = Duration::from_secs(config.interval_secs.max(1));
        self.max_concurrent = config.max_concurrent.max(1);
        self.catch_up_limit = config.catch_up_limit.max(1);
        self
    }

    /// Set the poll interval. Values below one millisecond are raised to it.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(MIN_INTERVAL);
        self
    }

    /// Share a lock table with the subscription management service.
    pub fn with_locks(mut self, locks: SubscriptionLocks) -> Self {
        self.locks = locks;
        self
    }

    /// Destination for subscriptions that do not name their own.
    pub fn with_default_destination(mut self, destination: impl Into<String>) -> Self {
        let destination = destination.into();
        self.default_destination = (!destination.is_empty()).then_some(destination);
        self
    }

    /// The lock table used by this scheduler.
    pub fn locks(&self) -> &SubscriptionLocks {
        &self.locks
    }

    /// Run until `shutdown` becomes `true` or its sender is dropped.
    ///
    /// The first cycle starts immediately. A cycle in progress when shutdown
    /// is requested finishes the subscriptions it has already started and
    /// skips the rest.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Poll scheduler started (interval: {} seconds, concurrency: {})",
            self.interval.as_secs(),
            self.max_concurrent
        );

        let mut timer = interval(self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = timer.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            if *shutdown.borrow() {
                break;
            }

            let report = self.cycle(&shutdown).await;
            if report.failures() > 0 {
                warn!(
                    "Poll cycle finished: {} subscription(s), {} sent, {} with errors",
                    report.outcomes.len(),
                    report.sent(),
                    report.failures()
                );
            } else {
                debug!(
                    "Poll cycle finished: {} subscription(s), {} sent",
                    report.outcomes.len(),
                    report.sent()
                );
            }
        }

        info!("Poll scheduler stopped");
    }

    /// Run a single cycle over all subscriptions.
    pub async fn poll_cycle(&self) -> CycleReport {
        let (_tx, rx) = watch::channel(false);
        self.cycle(&rx).await
    }

    async fn cycle(&self, shutdown: &watch::Receiver<bool>) -> CycleReport {
        let subscriptions = match SubscriptionRepository::new(self.db.pool()).list().await {
            Ok(subscriptions) => subscriptions,
            Err(e) => {
                error!("Failed to list subscriptions: {}", e);
                return CycleReport::default();
            }
        };

        if subscriptions.is_empty() {
            debug!("No subscriptions to poll");
            return CycleReport::default();
        }

        debug!("Polling {} subscription(s)", subscriptions.len());

        let outcomes: Vec<(String, PollOutcome)> = stream::iter(subscriptions)
            .map(|subscription| async move {
                let title = subscription.title;
                let span = info_span!("poll", subscription = %title);
                let outcome = self.poll_subscription(&title, shutdown).instrument(span).await;
                (title, outcome)
            })
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;

        CycleReport { outcomes }
    }

    /// Poll one subscription under its lock.
    ///
    /// The row is re-read after the lock is taken so the marker used is the
    /// latest committed one.
    async fn poll_subscription(
        &self,
        title: &str,
        shutdown: &watch::Receiver<bool>,
    ) -> PollOutcome {
        if *shutdown.borrow() {
            return PollOutcome::Skipped;
        }

        let _guard = self.locks.lock(title).await;

        let subscription = match SubscriptionRepository::new(self.db.pool())
            .find(title)
            .await
        {
            Ok(Some(subscription)) => subscription,
            Ok(None) => {
                debug!("Subscription removed before poll");
                return PollOutcome::Removed;
            }
            Err(e) => {
                error!("Failed to load subscription: {}", e);
                return PollOutcome::PersistFailed(e.to_string());
            }
        };

        self.process(&subscription).await
    }

    async fn process(&self, subscription: &Subscription) -> PollOutcome {
        let snapshot = match self.source.fetch(&subscription.source).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                report_failure(&format!("fetch {}", subscription.source), &e);
                return PollOutcome::FetchFailed(e.to_string());
            }
        };

        let delta = detect(
            &snapshot,
            subscription.last_seen.as_deref(),
            self.catch_up_limit,
        );
        let marker = match delta.marker.as_deref() {
            Some(marker) if !delta.is_empty() => marker,
            _ => {
                debug!("No new entries ({} in feed)", snapshot.len());
                return PollOutcome::UpToDate;
            }
        };

        let destination = match subscription
            .destination
            .as_deref()
            .or(self.default_destination.as_deref())
        {
            Some(destination) => destination,
            None => {
                warn!("No destination configured; leaving marker unchanged");
                return PollOutcome::NoDestination;
            }
        };

        match SubscriptionRepository::new(self.db.pool())
            .advance_last_seen(subscription, marker)
            .await
        {
            Ok(()) => {}
            Err(RelayError::NotFound(reason)) => {
                info!("Dropping batch of {}: {}", delta.len(), reason);
                return PollOutcome::Removed;
            }
            Err(e) => {
                report_failure("advance marker, skipping delivery", &e);
                return PollOutcome::PersistFailed(e.to_string());
            }
        }

        let found = delta.len();
        info!("{} new entr{} found", found, if found == 1 { "y" } else { "ies" });

        let mut sent = 0;
        let mut failed = 0;
        for entry in delta.new_entries {
            let entry_id = entry.entry_id.clone();
            let notification = Notification::new(entry, subscription.title.clone());
            match self.sink.send(destination, &notification).await {
                Ok(()) => sent += 1,
                Err(e) => {
                    warn!("Failed to deliver {}: {}", entry_id, e);
                    failed += 1;
                }
            }
        }

        PollOutcome::Delivered {
            found,
            sent,
            failed,
        }
    }
}

/// Log a per-subscription failure; transient ones are retried next cycle.
fn report_failure(action: &str, e: &RelayError) {
    if e.is_transient() {
        warn!("Failed to {} (retrying next cycle): {}", action, e);
    } else {
        error!("Failed to {}: {}", action, e);
    }
}

/// Handle to a scheduler running as a background task.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Request shutdown and wait for the in-flight cycle to wind down.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            error!("Poll scheduler task failed: {}", e);
        }
    }
}

/// Spawn the scheduler on the current tokio runtime.
pub fn start_poll_scheduler(scheduler: PollScheduler) -> SchedulerHandle {
    let (shutdown, rx) = watch::channel(false);
    let task = tokio::spawn(async move {
        scheduler.run(rx).await;
    });
    SchedulerHandle { shutdown, task }
}
