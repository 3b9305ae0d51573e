//! Feed polling and ingestion for RSSY.
//!
//! This module provides the feed client, the storage repositories, the
//! fetcher that ingests entries and the background poller.

pub mod client;
pub mod fetcher;
pub mod poller;
pub mod repository;
pub mod seed;
pub mod types;

pub use client::{parse_feed, validate_url, FeedClient};
pub use fetcher::FeedFetcher;
pub use poller::{Poller, PollerStatus, DEFAULT_POLL_INTERVAL_SECS};
pub use repository::{FeedRepository, PostRepository};
pub use seed::{default_feeds, seed_default_feeds};
pub use types::{
    EntryOutcome, Feed, FeedUpdate, FetchSummary, NewFeed, NewPost, ParsedEntry, ParsedFeed,
    PollSummary, Post, PostWithFeed,
};
