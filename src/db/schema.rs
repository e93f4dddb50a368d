//! Database schema and migrations for feedrelay.
//!
//! Migrations are applied sequentially when the database is opened; the
//! `schema_version` table records which ones have run.

/// Database migrations.
pub const MIGRATIONS: &[&str] = &[
    // v1: Subscriptions
    r#"
-- One row per subscribed feed. `last_seen` holds the entry ID of the most
-- recently delivered entry and stays NULL until something is delivered.
CREATE TABLE subscriptions (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    title        TEXT NOT NULL UNIQUE,
    source       TEXT NOT NULL,
    destination  TEXT,
    last_seen    TEXT,
    created_at   TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at   TEXT NOT NULL DEFAULT (datetime('now'))
);
"#,
];
