//! Feed fetcher for RSSY.
//!
//! Retrieves a feed, stores entries not seen before and records the outcome
//! on the feed. The fetcher owns no mutable state; uniqueness of
//! `(feed_id, guid)` is arbitrated by the database, so concurrent fetches of
//! the same feed never store an entry twice.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, warn};

use super::client::FeedClient;
use super::repository::{FeedRepository, PostRepository};
use super::types::{EntryOutcome, Feed, FetchSummary, NewPost, ParsedEntry, PollSummary};
use crate::config::Config;
use crate::db::Database;
use crate::{Result, RssyError};

/// Fetches feeds and ingests their entries.
#[derive(Debug, Clone)]
pub struct FeedFetcher {
    db: Database,
    client: FeedClient,
    max_concurrent: usize,
}

impl FeedFetcher {
    /// Create a fetcher with default client settings that fetches feeds one at a time.
    pub fn new(db: Database) -> Result<Self> {
        Ok(Self {
            db,
            client: FeedClient::new()?,
            max_concurrent: 1,
        })
    }

    /// Create a fetcher from configuration.
    pub fn with_config(db: Database, config: &Config) -> Result<Self> {
        Ok(Self {
            db,
            client: FeedClient::with_config(&config.fetch)?,
            max_concurrent: config.poller.max_concurrent_fetches.max(1),
        })
    }

    /// Create a fetcher around an existing client.
    pub fn with_client(db: Database, client: FeedClient, max_concurrent: usize) -> Self {
        Self {
            db,
            client,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Fetch one feed and store its new entries.
    ///
    /// Never fails: a retrieval or parse error is returned in the summary and
    /// recorded on the feed. Bookkeeping failures are logged.
    pub async fn fetch_one(&self, feed: &Feed) -> FetchSummary {
        debug!("Fetching feed {}: {}", feed.id, feed.url);
        let feeds = FeedRepository::new(self.db.pool());

        let parsed = match self.client.fetch(&feed.url).await {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Failed to fetch feed {} ({}): {}", feed.id, feed.url, e);
                let message = e.to_string();
                if let Err(err) = feeds.record_failure(feed.id, &message).await {
                    error!("Failed to record error for feed {}: {}", feed.id, err);
                }
                return FetchSummary::retrieval_failed(feed.id, message);
            }
        };

        let summary = self.ingest(feed.id, parsed.entries).await;

        if let Err(e) = feeds.record_success(feed.id, Utc::now()).await {
            error!("Failed to update last fetch time for feed {}: {}", feed.id, e);
        }

        if summary.created > 0 {
            info!(
                "Feed {} updated: {} new post(s), {} already known",
                feed.id, summary.created, summary.duplicates
            );
        } else {
            debug!("Feed {} updated: no new posts", feed.id);
        }

        summary
    }

    /// Store parsed entries of a feed in document order.
    pub async fn ingest(&self, feed_id: i64, entries: Vec<ParsedEntry>) -> FetchSummary {
        let mut summary = FetchSummary::new(feed_id);
        for entry in entries {
            let outcome = self.ingest_entry(feed_id, entry).await;
            summary.record(&outcome);
        }
        summary
    }

    /// Store one entry unless the feed already has its guid.
    async fn ingest_entry(&self, feed_id: i64, entry: ParsedEntry) -> EntryOutcome {
        if entry.guid.is_empty() {
            warn!("Skipping entry without identifier in feed {}", feed_id);
            return EntryOutcome::Failed("entry has no identifier".to_string());
        }

        let posts = PostRepository::new(self.db.pool());

        match posts.exists(feed_id, &entry.guid).await {
            Ok(true) => return EntryOutcome::Duplicate,
            Ok(false) => {}
            Err(e) => {
                error!(
                    "Failed to check post {} for feed {}: {}",
                    entry.guid, feed_id, e
                );
                return EntryOutcome::Failed(e.to_string());
            }
        }

        let new_post = NewPost::from_parsed(feed_id, entry);
        match posts.create(&new_post).await {
            Ok(id) => EntryOutcome::Created(id),
            // Another fetch of the same feed stored it first
            Err(RssyError::Conflict(_)) => {
                debug!("Post {} of feed {} already stored", new_post.guid, feed_id);
                EntryOutcome::Duplicate
            }
            Err(e) => {
                error!(
                    "Failed to store post {} for feed {}: {}",
                    new_post.guid, feed_id, e
                );
                EntryOutcome::Failed(e.to_string())
            }
        }
    }

    /// Fetch every active feed.
    ///
    /// Fails only if the active feeds cannot be listed. Up to
    /// `max_concurrent` feeds are fetched at once; a failing feed never
    /// prevents the others.
    pub async fn fetch_all(&self) -> Result<PollSummary> {
        let feeds = FeedRepository::new(self.db.pool()).list_active().await?;

        if feeds.is_empty() {
            debug!("No active feeds to fetch");
            return Ok(PollSummary::default());
        }

        info!("Fetching {} feed(s)", feeds.len());

        let summaries: Vec<FetchSummary> = stream::iter(feeds)
            .map(|feed| async move { self.fetch_one(&feed).await })
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;

        let mut poll = PollSummary::default();
        for summary in &summaries {
            poll.record(summary);
        }

        info!(
            "Fetched {} feed(s): {} succeeded, {} failed, {} new post(s)",
            poll.feeds, poll.succeeded, poll.failed, poll.created
        );
        Ok(poll)
    }

    /// Fetch one feed on demand.
    ///
    /// Returns [`RssyError::NotFound`] for an unknown feed and
    /// [`RssyError::Feed`] when retrieval fails (after bookkeeping).
    pub async fn refresh_feed(&self, feed_id: i64) -> Result<FetchSummary> {
        let feed = FeedRepository::new(self.db.pool())
            .get_by_id(feed_id)
            .await?
            .ok_or_else(|| RssyError::NotFound(format!("feed {}", feed_id)))?;

        let summary = self.fetch_one(&feed).await;
        match summary.error.clone() {
            Some(e) => Err(RssyError::Feed(e)),
            None => Ok(summary),
        }
    }

    /// Fetch every active feed on demand.
    pub async fn refresh_all(&self) -> Result<PollSummary> {
        self.fetch_all().await
    }
}
