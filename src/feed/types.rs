//! Feed and post types for RSSY.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A subscribed feed (source).
#[derive(Debug, Clone, Serialize)]
pub struct Feed {
    /// Feed ID.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Feed document URL (unique).
    pub url: String,
    /// Optional category.
    pub category: Option<String>,
    /// Site URL (the website the feed belongs to).
    pub site_url: Option<String>,
    /// Feed description.
    pub description: Option<String>,
    /// Whether the poller fetches this feed.
    pub is_active: bool,
    /// Last successful fetch.
    pub last_fetched_at: Option<DateTime<Utc>>,
    /// Number of consecutive fetch errors.
    pub error_count: i32,
    /// Last error message.
    pub last_error: Option<String>,
    /// When the feed was created.
    pub created_at: DateTime<Utc>,
    /// When the feed was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Feed {
    /// Whether the most recent fetch attempt failed.
    pub fn is_failing(&self) -> bool {
        self.error_count > 0
    }
}

/// New feed for creation.
#[derive(Debug, Clone)]
pub struct NewFeed {
    /// Display name.
    pub name: String,
    /// Feed document URL.
    pub url: String,
    /// Optional category.
    pub category: Option<String>,
    /// Site URL.
    pub site_url: Option<String>,
    /// Feed description.
    pub description: Option<String>,
}

impl NewFeed {
    /// Create a new feed.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            category: None,
            site_url: None,
            description: None,
        }
    }

    /// Build the feed for a subreddit (`programming` or `r/programming`).
    pub fn reddit(subreddit: &str) -> Self {
        let subreddit = subreddit.trim().trim_start_matches("r/").trim_matches('/');
        Self::new(
            format!("r/{}", subreddit),
            format!("https://www.reddit.com/r/{}/.rss", subreddit),
        )
        .with_category("Reddit")
        .with_site_url(format!("https://www.reddit.com/r/{}", subreddit))
        .with_description(format!("Reddit /r/{} feed", subreddit))
    }

    /// Set the category.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Set the site URL.
    pub fn with_site_url(mut self, site_url: impl Into<String>) -> Self {
        self.site_url = Some(site_url.into());
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Partial feed update. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct FeedUpdate {
    pub name: Option<String>,
    pub url: Option<String>,
    pub category: Option<Option<String>>,
    pub site_url: Option<Option<String>>,
    pub description: Option<Option<String>>,
    pub is_active: Option<bool>,
}

impl FeedUpdate {
    /// Create an empty update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set or clear the category.
    pub fn with_category(mut self, category: Option<String>) -> Self {
        self.category = Some(category);
        self
    }

    /// Disable the feed.
    pub fn disable(mut self) -> Self {
        self.is_active = Some(false);
        self
    }

    /// Check if the update is empty.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.url.is_none()
            && self.category.is_none()
            && self.site_url.is_none()
            && self.description.is_none()
            && self.is_active.is_none()
    }
}

/// A post (entry) belonging to a feed.
#[derive(Debug, Clone, Serialize)]
pub struct Post {
    /// Post ID.
    pub id: i64,
    /// Owning feed.
    pub feed_id: i64,
    /// Title.
    pub title: String,
    /// Link to the original article.
    pub link: String,
    /// Short description or summary.
    pub description: String,
    /// Full content body.
    pub content: String,
    /// Author name, empty when unknown.
    pub author: String,
    /// Publication time.
    pub published_at: Option<DateTime<Utc>>,
    /// Lead image URL, empty when unknown.
    pub image_url: String,
    /// Feed-native identifier, unique within the feed.
    pub guid: String,
    /// Read flag.
    pub is_read: bool,
    /// When the post was stored.
    pub created_at: DateTime<Utc>,
    /// When the post was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Post joined with the name of its feed.
#[derive(Debug, Clone, Serialize)]
pub struct PostWithFeed {
    #[serde(flatten)]
    pub post: Post,
    pub feed_name: String,
}

/// New post for insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPost {
    pub feed_id: i64,
    pub guid: String,
    pub title: String,
    pub link: String,
    pub description: String,
    pub content: String,
    pub author: String,
    pub published_at: Option<DateTime<Utc>>,
    pub image_url: String,
}

impl NewPost {
    /// Create a post with the given identity and title; other fields empty.
    pub fn new(feed_id: i64, guid: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            feed_id,
            guid: guid.into(),
            title: title.into(),
            link: String::new(),
            description: String::new(),
            content: String::new(),
            author: String::new(),
            published_at: None,
            image_url: String::new(),
        }
    }

    /// Build the insertable post for a parsed entry of `feed_id`.
    pub fn from_parsed(feed_id: i64, entry: ParsedEntry) -> Self {
        Self {
            feed_id,
            guid: entry.guid,
            title: entry.title,
            link: entry.link,
            description: entry.description,
            content: entry.content,
            author: entry.author,
            published_at: entry.published_at,
            image_url: entry.image_url,
        }
    }

    /// Set the link.
    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = link.into();
        self
    }

    /// Set the author.
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    /// Set the published date.
    pub fn with_published_at(mut self, published_at: DateTime<Utc>) -> Self {
        self.published_at = Some(published_at);
        self
    }
}

/// Parsed feed document.
#[derive(Debug, Clone)]
pub struct ParsedFeed {
    /// Entries in document order.
    pub entries: Vec<ParsedEntry>,
}

/// One normalized entry of a parsed document.
///
/// Author and image are already resolved; absent values are empty strings.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedEntry {
    pub guid: String,
    pub title: String,
    pub link: String,
    pub description: String,
    pub content: String,
    pub author: String,
    pub published_at: Option<DateTime<Utc>>,
    pub image_url: String,
}

/// Result of ingesting one parsed entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOutcome {
    /// Stored as a new post with this ID.
    Created(i64),
    /// Already present for this feed (including a lost insert race).
    Duplicate,
    /// Storage failed for this entry; the rest of the document continues.
    Failed(String),
}

/// Per-feed result of one fetch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FetchSummary {
    pub feed_id: i64,
    pub created: usize,
    pub duplicates: usize,
    pub failed: usize,
    /// Retrieval or parse error; when set no entries were processed.
    pub error: Option<String>,
}

impl FetchSummary {
    /// Empty summary for a feed.
    pub fn new(feed_id: i64) -> Self {
        Self {
            feed_id,
            ..Self::default()
        }
    }

    /// Summary for a feed whose document could not be retrieved or parsed.
    pub fn retrieval_failed(feed_id: i64, error: impl Into<String>) -> Self {
        Self {
            feed_id,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Fold one entry outcome into the counts.
    pub fn record(&mut self, outcome: &EntryOutcome) {
        match outcome {
            EntryOutcome::Created(_) => self.created += 1,
            EntryOutcome::Duplicate => self.duplicates += 1,
            EntryOutcome::Failed(_) => self.failed += 1,
        }
    }

    /// Whether the document was retrieved and parsed.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate result of fetching every active feed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PollSummary {
    /// Feeds attempted.
    pub feeds: usize,
    /// Feeds whose document was retrieved and parsed.
    pub succeeded: usize,
    /// Feeds whose retrieval or parsing failed.
    pub failed: usize,
    /// New posts across all feeds.
    pub created: usize,
}

impl PollSummary {
    /// Fold one feed summary into the totals.
    pub fn record(&mut self, summary: &FetchSummary) {
        self.feeds += 1;
        self.created += summary.created;
        if summary.is_success() {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_feed_builder() {
        let feed = NewFeed::new("Example", "https://example.com/feed.xml")
            .with_category("Tech")
            .with_site_url("https://example.com");
        assert_eq!(feed.name, "Example");
        assert_eq!(feed.url, "https://example.com/feed.xml");
        assert_eq!(feed.category.as_deref(), Some("Tech"));
        assert_eq!(feed.site_url.as_deref(), Some("https://example.com"));
        assert!(feed.description.is_none());
    }

    #[test]
    fn test_new_feed_reddit() {
        let feed = NewFeed::reddit("rust");
        assert_eq!(feed.name, "r/rust");
        assert_eq!(feed.url, "https://www.reddit.com/r/rust/.rss");
        assert_eq!(feed.category.as_deref(), Some("Reddit"));
        assert_eq!(feed.site_url.as_deref(), Some("https://www.reddit.com/r/rust"));

        let prefixed = NewFeed::reddit("r/rust/");
        assert_eq!(prefixed.url, feed.url);
    }

    #[test]
    fn test_feed_update_is_empty() {
        assert!(FeedUpdate::new().is_empty());
        assert!(!FeedUpdate::new().disable().is_empty());
        assert!(!FeedUpdate::new().with_category(None).is_empty());
    }

    #[test]
    fn test_fetch_summary_record() {
        let mut summary = FetchSummary::new(7);
        summary.record(&EntryOutcome::Created(1));
        summary.record(&EntryOutcome::Created(2));
        summary.record(&EntryOutcome::Duplicate);
        summary.record(&EntryOutcome::Failed("disk full".into()));

        assert_eq!(summary.feed_id, 7);
        assert_eq!(summary.created, 2);
        assert_eq!(summary.duplicates, 1);
        assert_eq!(summary.failed, 1);
        assert!(summary.is_success());
    }

    #[test]
    fn test_poll_summary_record() {
        let mut poll = PollSummary::default();
        let mut ok = FetchSummary::new(1);
        ok.created = 3;
        poll.record(&ok);
        poll.record(&FetchSummary::retrieval_failed(2, "timeout"));

        assert_eq!(poll.feeds, 2);
        assert_eq!(poll.succeeded, 1);
        assert_eq!(poll.failed, 1);
        assert_eq!(poll.created, 3);
    }

    #[test]
    fn test_post_with_feed_serializes_flat() {
        let now = Utc::now();
        let post = PostWithFeed {
            post: Post {
                id: 1,
                feed_id: 2,
                title: "Hello".into(),
                link: "https://example.com/1".into(),
                description: String::new(),
                content: String::new(),
                author: String::new(),
                published_at: None,
                image_url: String::new(),
                guid: "g1".into(),
                is_read: false,
                created_at: now,
                updated_at: now,
            },
            feed_name: "Example".into(),
        };

        let json = serde_json::to_value(&post).unwrap();
        assert_eq!(json["title"], "Hello");
        assert_eq!(json["feed_name"], "Example");
        assert!(json["published_at"].is_null());
    }
}
