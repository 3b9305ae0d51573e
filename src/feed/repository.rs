//! Feed and post repositories for RSSY.

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{QueryBuilder, Sqlite};

use super::types::{Feed, FeedUpdate, NewFeed, NewPost, Post, PostWithFeed};
use crate::db::DbPool;
use crate::{Result, RssyError};

const FEED_COLUMNS: &str = "id, name, url, category, site_url, description, is_active, \
     last_fetched_at, error_count, last_error, created_at, updated_at";

/// Current time in the stored timestamp format.
const SQL_NOW: &str = "strftime('%Y-%m-%dT%H:%M:%fZ', 'now')";

const POST_COLUMNS: &str = "id, feed_id, title, link, description, content, author, \
     published_at, image_url, guid, is_read, created_at, updated_at";

/// Row type for feeds.
#[derive(Debug, Clone, sqlx::FromRow)]
struct FeedRow {
    id: i64,
    name: String,
    url: String,
    category: Option<String>,
    site_url: Option<String>,
    description: Option<String>,
    is_active: bool,
    last_fetched_at: Option<String>,
    error_count: i32,
    last_error: Option<String>,
    created_at: String,
    updated_at: String,
}

impl From<FeedRow> for Feed {
    fn from(row: FeedRow) -> Self {
        Feed {
            id: row.id,
            name: row.name,
            url: row.url,
            category: row.category,
            site_url: row.site_url,
            description: row.description,
            is_active: row.is_active,
            last_fetched_at: row.last_fetched_at.and_then(|s| parse_datetime(&s)),
            error_count: row.error_count,
            last_error: row.last_error,
            created_at: parse_datetime(&row.created_at).unwrap_or_else(Utc::now),
            updated_at: parse_datetime(&row.updated_at).unwrap_or_else(Utc::now),
        }
    }
}

/// Row type for posts.
#[derive(Debug, Clone, sqlx::FromRow)]
struct PostRow {
    id: i64,
    feed_id: i64,
    title: String,
    link: String,
    description: String,
    content: String,
    author: String,
    published_at: Option<String>,
    image_url: String,
    guid: String,
    is_read: bool,
    created_at: String,
    updated_at: String,
}

impl From<PostRow> for Post {
    fn from(row: PostRow) -> Self {
        Post {
            id: row.id,
            feed_id: row.feed_id,
            title: row.title,
            link: row.link,
            description: row.description,
            content: row.content,
            author: row.author,
            published_at: row.published_at.and_then(|s| parse_datetime(&s)),
            image_url: row.image_url,
            guid: row.guid,
            is_read: row.is_read,
            created_at: parse_datetime(&row.created_at).unwrap_or_else(Utc::now),
            updated_at: parse_datetime(&row.updated_at).unwrap_or_else(Utc::now),
        }
    }
}

/// Row type for posts joined with their feed name.
#[derive(Debug, Clone, sqlx::FromRow)]
struct PostWithFeedRow {
    #[sqlx(flatten)]
    post: PostRow,
    feed_name: String,
}

impl From<PostWithFeedRow> for PostWithFeed {
    fn from(row: PostWithFeedRow) -> Self {
        PostWithFeed {
            post: row.post.into(),
            feed_name: row.feed_name,
        }
    }
}

/// Repository for feed operations.
pub struct FeedRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> FeedRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Create a new feed.
    ///
    /// Returns [`RssyError::Conflict`] if the URL is already subscribed.
    pub async fn create(&self, feed: &NewFeed) -> Result<Feed> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO feeds (name, url, category, site_url, description)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(&feed.name)
        .bind(&feed.url)
        .bind(&feed.category)
        .bind(&feed.site_url)
        .bind(&feed.description)
        .fetch_one(self.pool)
        .await?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| RssyError::NotFound("feed".into()))
    }

    /// Get a feed by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Feed>> {
        let query = format!("SELECT {} FROM feeds WHERE id = $1", FEED_COLUMNS);
        let row = sqlx::query_as::<_, FeedRow>(&query)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(Feed::from))
    }

    /// Get a feed by URL.
    pub async fn get_by_url(&self, url: &str) -> Result<Option<Feed>> {
        let query = format!("SELECT {} FROM feeds WHERE url = $1", FEED_COLUMNS);
        let row = sqlx::query_as::<_, FeedRow>(&query)
            .bind(url)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(Feed::from))
    }

    /// List all feeds (including inactive), ordered by name.
    pub async fn list_all(&self) -> Result<Vec<Feed>> {
        let query = format!("SELECT {} FROM feeds ORDER BY name ASC, id ASC", FEED_COLUMNS);
        let rows = sqlx::query_as::<_, FeedRow>(&query)
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(Feed::from).collect())
    }

    /// List active feeds, ordered by registration.
    pub async fn list_active(&self) -> Result<Vec<Feed>> {
        let query = format!(
            "SELECT {} FROM feeds WHERE is_active = 1 ORDER BY id ASC",
            FEED_COLUMNS
        );
        let rows = sqlx::query_as::<_, FeedRow>(&query)
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(Feed::from).collect())
    }

    /// Apply a partial update. Returns `false` if nothing changed.
    pub async fn update(&self, id: i64, update: &FeedUpdate) -> Result<bool> {
        if update.is_empty() {
            return Ok(false);
        }

        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE feeds SET ");
        let mut separated = query.separated(", ");

        if let Some(ref name) = update.name {
            separated.push("name = ");
            separated.push_bind_unseparated(name.clone());
        }
        if let Some(ref url) = update.url {
            separated.push("url = ");
            separated.push_bind_unseparated(url.clone());
        }
        if let Some(ref category) = update.category {
            separated.push("category = ");
            separated.push_bind_unseparated(category.clone());
        }
        if let Some(ref site_url) = update.site_url {
            separated.push("site_url = ");
            separated.push_bind_unseparated(site_url.clone());
        }
        if let Some(ref description) = update.description {
            separated.push("description = ");
            separated.push_bind_unseparated(description.clone());
        }
        if let Some(is_active) = update.is_active {
            separated.push("is_active = ");
            separated.push_bind_unseparated(is_active);
        }
        separated.push(format!("updated_at = {}", SQL_NOW));

        query.push(" WHERE id = ");
        query.push_bind(id);

        let result = query.build().execute(self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    /// Record a successful fetch: set `last_fetched_at` and clear error state.
    pub async fn record_success(&self, id: i64, fetched_at: DateTime<Utc>) -> Result<bool> {
        let query = format!(
            r#"
            UPDATE feeds
            SET last_fetched_at = $1,
                error_count = 0,
                last_error = NULL,
                updated_at = {}
            WHERE id = $2
            "#,
            SQL_NOW
        );
        let result = sqlx::query(&query)
        .bind(format_datetime(fetched_at))
        .bind(id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Record a failed fetch: increment the error count and store the message.
    pub async fn record_failure(&self, id: i64, error: &str) -> Result<bool> {
        let query = format!(
            r#"
            UPDATE feeds
            SET error_count = error_count + 1,
                last_error = $1,
                updated_at = {}
            WHERE id = $2
            "#,
            SQL_NOW
        );
        let result = sqlx::query(&query)
        .bind(error)
        .bind(id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete a feed; its posts are removed by cascade.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM feeds WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Count all feeds.
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM feeds")
            .fetch_one(self.pool)
            .await?;

        Ok(count)
    }
}

/// Repository for post operations.
pub struct PostRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> PostRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Check whether a post with this guid exists for the feed.
    pub async fn exists(&self, feed_id: i64, guid: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM posts WHERE feed_id = $1 AND guid = $2)",
        )
        .bind(feed_id)
        .bind(guid)
        .fetch_one(self.pool)
        .await?;

        Ok(exists)
    }

    /// Insert a new post and return its ID.
    ///
    /// The `(feed_id, guid)` constraint is enforced by the database; a
    /// duplicate yields [`RssyError::Conflict`].
    pub async fn create(&self, post: &NewPost) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO posts (feed_id, title, link, description, content, author,
                               published_at, image_url, guid)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
            "#,
        )
        .bind(post.feed_id)
        .bind(&post.title)
        .bind(&post.link)
        .bind(&post.description)
        .bind(&post.content)
        .bind(&post.author)
        .bind(post.published_at.map(format_datetime))
        .bind(&post.image_url)
        .bind(&post.guid)
        .fetch_one(self.pool)
        .await?;

        Ok(id)
    }

    /// Get a post by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Post>> {
        let query = format!("SELECT {} FROM posts WHERE id = $1", POST_COLUMNS);
        let row = sqlx::query_as::<_, PostRow>(&query)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(Post::from))
    }

    /// Get a post by feed ID and guid.
    pub async fn get_by_guid(&self, feed_id: i64, guid: &str) -> Result<Option<Post>> {
        let query = format!(
            "SELECT {} FROM posts WHERE feed_id = $1 AND guid = $2",
            POST_COLUMNS
        );
        let row = sqlx::query_as::<_, PostRow>(&query)
            .bind(feed_id)
            .bind(guid)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(Post::from))
    }

    /// List posts across all feeds, newest first.
    pub async fn list_all(&self, limit: i64, offset: i64) -> Result<Vec<PostWithFeed>> {
        let rows = sqlx::query_as::<_, PostWithFeedRow>(
            r#"
            SELECT p.id, p.feed_id, p.title, p.link, p.description, p.content, p.author,
                   p.published_at, p.image_url, p.guid, p.is_read, p.created_at, p.updated_at,
                   f.name AS feed_name
            FROM posts p
            JOIN feeds f ON p.feed_id = f.id
            ORDER BY COALESCE(p.published_at, p.created_at) DESC, p.id DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(PostWithFeed::from).collect())
    }

    /// List posts of one feed, newest first.
    pub async fn list_by_feed(&self, feed_id: i64, limit: i64, offset: i64) -> Result<Vec<Post>> {
        let query = format!(
            r#"
            SELECT {} FROM posts
            WHERE feed_id = $1
            ORDER BY COALESCE(published_at, created_at) DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
            POST_COLUMNS
        );
        let rows = sqlx::query_as::<_, PostRow>(&query)
            .bind(feed_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(Post::from).collect())
    }

    /// Count posts of one feed.
    pub async fn count_by_feed(&self, feed_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE feed_id = $1")
            .bind(feed_id)
            .fetch_one(self.pool)
            .await?;

        Ok(count)
    }

    /// Set the read flag of a post.
    pub async fn mark_read(&self, id: i64, is_read: bool) -> Result<bool> {
        let query = format!(
            "UPDATE posts SET is_read = $1, updated_at = {} WHERE id = $2",
            SQL_NOW
        );
        let result = sqlx::query(&query)
        .bind(is_read)
        .bind(id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete every post (reset).
    pub async fn delete_all(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM posts").execute(self.pool).await?;
        Ok(result.rows_affected())
    }
}

/// Format a timestamp for storage, matching `SQL_NOW` so stored values
/// compare in time order.
fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored datetime string.
fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
