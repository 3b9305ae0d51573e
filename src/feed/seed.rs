//! Default feeds for a fresh database.

use tracing::{info, warn};

use super::repository::FeedRepository;
use super::types::NewFeed;
use crate::db::Database;
use crate::Result;

/// Feeds subscribed on first start.
pub fn default_feeds() -> Vec<NewFeed> {
    vec![
        NewFeed::new("Hacker News", "https://news.ycombinator.com/rss")
            .with_category("Tech")
            .with_site_url("https://news.ycombinator.com")
            .with_description("Hacker News front page"),
        NewFeed::new("TechCrunch", "https://techcrunch.com/feed/")
            .with_category("Tech")
            .with_site_url("https://techcrunch.com")
            .with_description("Startup and technology news"),
        NewFeed::new(
            "Reddit - Programming",
            "https://www.reddit.com/r/programming/.rss",
        )
        .with_category("Tech")
        .with_site_url("https://www.reddit.com/r/programming")
        .with_description("Reddit /r/programming feed"),
        NewFeed::new(
            "Ars Technica",
            "https://feeds.arstechnica.com/arstechnica/index",
        )
        .with_category("Tech")
        .with_site_url("https://arstechnica.com")
        .with_description("Technology news and analysis"),
    ]
}

/// Insert the default feeds if the database has none.
///
/// Returns the number of feeds inserted.
pub async fn seed_default_feeds(db: &Database) -> Result<usize> {
    let repo = FeedRepository::new(db.pool());

    if repo.count().await? > 0 {
        return Ok(0);
    }

    let mut inserted = 0;
    for feed in default_feeds() {
        match repo.create(&feed).await {
            Ok(_) => inserted += 1,
            Err(e) if e.is_conflict() => {
                warn!("Default feed {} already exists", feed.url);
            }
            Err(e) => return Err(e),
        }
    }

    info!("Seeded {} default feed(s)", inserted);
    Ok(inserted)
}
