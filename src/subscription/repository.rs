//! Subscription repository for feedrelay.
//!
//! Every mutating call is a single statement that SQLite commits before
//! returning, so a successful return means the change is durable.

use chrono::{DateTime, Utc};

use super::types::{NewSubscription, Subscription};
use crate::db::DbPool;
use crate::{RelayError, Result};

/// Row type for a subscription from the database.
#[derive(Debug, Clone, sqlx::FromRow)]
struct SubscriptionRow {
    id: i64,
    title: String,
    source: String,
    destination: Option<String>,
    last_seen: Option<String>,
    created_at: String,
    updated_at: String,
}

impl From<SubscriptionRow> for Subscription {
    fn from(row: SubscriptionRow) -> Self {
        Subscription {
            id: row.id,
            title: row.title,
            source: row.source,
            destination: row.destination,
            last_seen: row.last_seen,
            created_at: parse_datetime(&row.created_at).unwrap_or_else(Utc::now),
            updated_at: parse_datetime(&row.updated_at).unwrap_or_else(Utc::now),
        }
    }
}

/// Repository for subscription operations.
pub struct SubscriptionRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> SubscriptionRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Add a new subscription.
    ///
    /// Fails with [`RelayError::DuplicateTitle`] if the title is taken; the
    /// existing row is left untouched in that case.
    pub async fn add(&self, subscription: &NewSubscription) -> Result<Subscription> {
        let result = sqlx::query(
            r#"
            INSERT INTO subscriptions (title, source, destination, last_seen)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&subscription.title)
        .bind(&subscription.source)
        .bind(&subscription.destination)
        .bind(&subscription.last_seen)
        .execute(self.pool)
        .await;

        match result {
            Ok(_) => {}
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                return Err(RelayError::DuplicateTitle(subscription.title.clone()));
            }
            Err(e) => return Err(e.into()),
        }

        self.get(&subscription.title).await
    }

    /// Get a subscription by title, or `None` if it does not exist.
    pub async fn find(&self, title: &str) -> Result<Option<Subscription>> {
        let row = sqlx::query_as::<_, SubscriptionRow>(
            r#"
            SELECT id, title, source, destination, last_seen, created_at, updated_at
            FROM subscriptions
            WHERE title = $1
            "#,
        )
        .bind(title)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Subscription::from))
    }

    /// Get a subscription by title.
    pub async fn get(&self, title: &str) -> Result<Subscription> {
        self.find(title)
            .await?
            .ok_or_else(|| not_found(title))
    }

    /// List all subscriptions in insertion order.
    pub async fn list(&self) -> Result<Vec<Subscription>> {
        let rows = sqlx::query_as::<_, SubscriptionRow>(
            r#"
            SELECT id, title, source, destination, last_seen, created_at, updated_at
            FROM subscriptions
            ORDER BY id ASC
            "#,
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Subscription::from).collect())
    }

    /// Remove a subscription.
    pub async fn remove(&self, title: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM subscriptions WHERE title = $1")
            .bind(title)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(not_found(title));
        }
        Ok(())
    }

    /// Record `marker` as the most recently delivered entry.
    pub async fn update_last_seen(&self, title: &str, marker: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions
            SET last_seen = $1, updated_at = datetime('now')
            WHERE title = $2
            "#,
        )
        .bind(marker)
        .bind(title)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(not_found(title));
        }
        Ok(())
    }

    /// Advance the marker of the exact row `subscription` was read from.
    ///
    /// The update only applies while the row still has the same id and the
    /// same marker. A subscription removed, or removed and re-added under the
    /// same title, or advanced by someone else since it was read, matches
    /// nothing and yields [`RelayError::NotFound`].
    pub async fn advance_last_seen(
        &self,
        subscription: &Subscription,
        marker: &str,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions
            SET last_seen = $1, updated_at = datetime('now')
            WHERE id = $2 AND last_seen IS $3
            "#,
        )
        .bind(marker)
        .bind(subscription.id)
        .bind(subscription.last_seen.as_deref())
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RelayError::NotFound(format!(
                "subscription '{}' (id {}) changed since it was read",
                subscription.title, subscription.id
            )));
        }
        Ok(())
    }
}

fn not_found(title: &str) -> RelayError {
    RelayError::NotFound(format!("subscription '{}'", title))
}

/// Parse a datetime string to DateTime<Utc>.
fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // SQLite datetime('now') format
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(DateTime::from_naive_utc_and_offset(naive, Utc));
    }
    None
}
