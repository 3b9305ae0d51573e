//! Database schema and migrations for RSSY.
//!
//! Migrations are applied in order when the database is opened; the
//! `schema_version` table records which ones have run. Timestamps are
//! RFC 3339 UTC text with milliseconds so they sort lexically.

/// Database migrations.
pub const MIGRATIONS: &[&str] = &[
    // v1: feeds (sources) and posts (entries)
    r#"
CREATE TABLE feeds (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    name            TEXT NOT NULL,
    url             TEXT NOT NULL UNIQUE,
    category        TEXT,
    site_url        TEXT,
    description     TEXT,
    is_active       INTEGER NOT NULL DEFAULT 1,
    last_fetched_at TEXT,                      -- last successful fetch
    error_count     INTEGER NOT NULL DEFAULT 0,
    last_error      TEXT,
    created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    updated_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE INDEX idx_feeds_is_active ON feeds(is_active);
CREATE INDEX idx_feeds_last_fetched ON feeds(last_fetched_at);

CREATE TABLE posts (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    feed_id         INTEGER NOT NULL REFERENCES feeds(id) ON DELETE CASCADE,
    title           TEXT NOT NULL,
    link            TEXT NOT NULL,
    description     TEXT NOT NULL DEFAULT '',
    content         TEXT NOT NULL DEFAULT '',
    author          TEXT NOT NULL DEFAULT '',
    published_at    TEXT,
    image_url       TEXT NOT NULL DEFAULT '',
    guid            TEXT NOT NULL,
    is_read         INTEGER NOT NULL DEFAULT 0,
    created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    updated_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    UNIQUE(feed_id, guid)
);

CREATE INDEX idx_posts_feed_id ON posts(feed_id);
CREATE INDEX idx_posts_published_at ON posts(published_at DESC);
CREATE INDEX idx_posts_is_read ON posts(is_read);
"#,
];
