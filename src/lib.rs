//! RSSY - personal feed aggregator
//!
//! Background polling and ingestion of RSS/Atom feeds into SQLite.

pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod logging;

pub use config::Config;
pub use db::Database;
pub use error::{Result, RssyError};
pub use feed::{
    seed_default_feeds, EntryOutcome, Feed, FeedClient, FeedFetcher, FeedRepository, FeedUpdate,
    FetchSummary, NewFeed, NewPost, PollSummary, Poller, PollerStatus, Post, PostRepository,
    PostWithFeed,
};
