//! Test helpers for integration tests.
//!
//! Provides a local feed server, RSS/Atom document builders and helpers
//! for creating databases, feeds and fetchers.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;

use rssy::config::{Config, FetchConfig};
use rssy::{Database, Feed, FeedClient, FeedFetcher, FeedRepository, NewFeed};

/// Default timeout for waiting on background work.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Documents and request counters shared with the router.
#[derive(Default)]
struct ServerState {
    documents: Mutex<HashMap<String, String>>,
    hits: Mutex<HashMap<String, usize>>,
    total_hits: AtomicUsize,
}

/// Handle to a running local feed server.
///
/// Serves:
/// - `GET /feeds/:name`: the document registered under `name`, or 404
/// - `GET /slow/:millis/:name`: the same, after a delay of `millis`
/// - `GET /error`: always 500
pub struct FeedServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
}

impl FeedServer {
    /// Start the server on a random port.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(ServerState::default());

        let app = Router::new()
            .route("/feeds/:name", get(serve_feed))
            .route("/slow/:millis/:name", get(serve_slow_feed))
            .route("/error", get(serve_error))
            .with_state(Arc::clone(&state));

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    /// URL of the document registered under `name`.
    pub fn feed_url(&self, name: &str) -> String {
        format!("http://{}/feeds/{}", self.addr, name)
    }

    /// URL of the document registered under `name`, served after `delay`.
    ///
    /// Requests are counted under `name` when they arrive.
    pub fn slow_url(&self, name: &str, delay: Duration) -> String {
        format!("http://{}/slow/{}/{}", self.addr, delay.as_millis(), name)
    }

    /// URL that always answers 500.
    pub fn error_url(&self) -> String {
        format!("http://{}/error", self.addr)
    }

    /// Register or replace a document.
    pub fn set_document(&self, name: &str, body: impl Into<String>) {
        self.state
            .documents
            .lock()
            .unwrap()
            .insert(name.to_string(), body.into());
    }

    /// Requests received for `name`.
    pub fn hits(&self, name: &str) -> usize {
        self.state
            .hits
            .lock()
            .unwrap()
            .get(name)
            .copied()
            .unwrap_or(0)
    }

    /// Requests received on any route.
    pub fn total_hits(&self) -> usize {
        self.state.total_hits.load(Ordering::SeqCst)
    }
}

async fn serve_feed(Path(name): Path<String>, State(state): State<Arc<ServerState>>) -> Response {
    record_hit(&state, &name);
    document_response(&state, &name)
}

async fn serve_slow_feed(
    Path((millis, name)): Path<(u64, String)>,
    State(state): State<Arc<ServerState>>,
) -> Response {
    record_hit(&state, &name);
    tokio::time::sleep(Duration::from_millis(millis)).await;
    document_response(&state, &name)
}

fn record_hit(state: &ServerState, name: &str) {
    state.total_hits.fetch_add(1, Ordering::SeqCst);
    *state.hits.lock().unwrap().entry(name.to_string()).or_insert(0) += 1;
}

fn document_response(state: &ServerState, name: &str) -> Response {
    let document = state.documents.lock().unwrap().get(name).cloned();
    match document {
        Some(body) => ([(header::CONTENT_TYPE, "application/xml")], body).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn serve_error(State(state): State<Arc<ServerState>>) -> Response {
    state.total_hits.fetch_add(1, Ordering::SeqCst);
    (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response()
}

/// One item of a test RSS document.
pub struct Item<'a> {
    pub guid: &'a str,
    pub title: &'a str,
    pub extra: &'a str,
}

impl<'a> Item<'a> {
    pub fn new(guid: &'a str, title: &'a str) -> Self {
        Self {
            guid,
            title,
            extra: "",
        }
    }

    /// Raw XML appended inside `<item>`.
    pub fn with_extra(mut self, extra: &'a str) -> Self {
        self.extra = extra;
        self
    }
}

/// Build an RSS 2.0 document.
pub fn rss_document(title: &str, items: &[Item<'_>]) -> String {
    let mut body = String::new();
    for item in items {
        body.push_str(&format!(
            "    <item>\n      <title>{title}</title>\n      <link>https://example.com/{guid}</link>\n      <guid>{guid}</guid>\n      {extra}\n    </item>\n",
            title = item.title,
            guid = item.guid,
            extra = item.extra,
        ));
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/">
  <channel>
    <title>{title}</title>
    <link>https://example.com</link>
    <description>Test feed</description>
{body}  </channel>
</rss>"#
    )
}

/// Open an in-memory database.
pub async fn setup_db() -> Database {
    Database::open_in_memory().await.unwrap()
}

/// Fetch configuration that may reach the local test server.
pub fn test_fetch_config() -> FetchConfig {
    FetchConfig {
        connect_timeout_secs: 2,
        read_timeout_secs: 2,
        total_timeout_secs: 5,
        allow_private_hosts: true,
        ..FetchConfig::default()
    }
}

/// Fetcher that may reach the local test server.
pub fn test_fetcher(db: &Database) -> FeedFetcher {
    let mut config = Config::default();
    config.fetch = test_fetch_config();
    FeedFetcher::with_config(db.clone(), &config).unwrap()
}

/// Fetcher with a custom client configuration.
pub fn fetcher_with(db: &Database, fetch: &FetchConfig, max_concurrent: usize) -> FeedFetcher {
    let client = FeedClient::with_config(fetch).unwrap();
    FeedFetcher::with_client(db.clone(), client, max_concurrent)
}

/// Subscribe a feed.
pub async fn create_feed(db: &Database, name: &str, url: &str) -> Feed {
    FeedRepository::new(db.pool())
        .create(&NewFeed::new(name, url))
        .await
        .unwrap()
}

/// Reload a feed from the database.
pub async fn reload_feed(db: &Database, id: i64) -> Feed {
    FeedRepository::new(db.pool())
        .get_by_id(id)
        .await
        .unwrap()
        .unwrap()
}

/// Poll `condition` until it holds or `DEFAULT_TIMEOUT` elapses.
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + DEFAULT_TIMEOUT;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
