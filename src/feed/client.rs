//! Feed client with security measures.
//!
//! Retrieves a feed document over HTTP with SSRF protection and resource
//! limits, then parses it into a normalized [`ParsedFeed`].

use std::net::IpAddr;
use std::time::Duration;

use feed_rs::model::Entry;
use feed_rs::parser;
use reqwest::Client;

use super::types::{ParsedEntry, ParsedFeed};
use crate::config::FetchConfig;
use crate::{Result, RssyError};

/// HTTP feed client.
#[derive(Clone)]
pub struct FeedClient {
    client: Client,
    max_feed_size: u64,
    allow_private_hosts: bool,
}

impl FeedClient {
    /// Create a client with default settings.
    pub fn new() -> Result<Self> {
        Self::with_config(&FetchConfig::default())
    }

    /// Create a client from fetch configuration.
    pub fn with_config(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .read_timeout(Duration::from_secs(config.read_timeout_secs))
            .timeout(Duration::from_secs(config.total_timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| RssyError::Feed(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            max_feed_size: config.max_feed_size_bytes,
            allow_private_hosts: config.allow_private_hosts,
        })
    }

    /// Fetch and parse the feed at `url`.
    pub async fn fetch(&self, url: &str) -> Result<ParsedFeed> {
        if self.allow_private_hosts {
            validate_scheme(url)?;
        } else {
            validate_url(url)?;
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RssyError::Feed(format!("failed to fetch feed: {}", e)))?;

        if !response.status().is_success() {
            return Err(RssyError::Feed(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        if let Some(content_length) = response.content_length() {
            if content_length > self.max_feed_size {
                return Err(RssyError::Feed(format!(
                    "feed too large: {} bytes (max {} bytes)",
                    content_length, self.max_feed_size
                )));
            }
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| RssyError::Feed(format!("failed to read response: {}", e)))?;

        // Chunked responses carry no content length
        if bytes.len() as u64 > self.max_feed_size {
            return Err(RssyError::Feed(format!(
                "feed too large: {} bytes (max {} bytes)",
                bytes.len(),
                self.max_feed_size
            )));
        }

        parse_feed(&bytes)
    }
}

impl std::fmt::Debug for FeedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedClient")
            .field("max_feed_size", &self.max_feed_size)
            .field("allow_private_hosts", &self.allow_private_hosts)
            .finish()
    }
}

/// Parse a URL and check that it uses http or https.
fn validate_scheme(url: &str) -> Result<url::Url> {
    let parsed =
        url::Url::parse(url).map_err(|e| RssyError::Feed(format!("invalid URL: {}", e)))?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(RssyError::Feed(format!(
            "unsupported URL scheme: {}",
            scheme
        ))),
    }
}

/// Validate a URL for SSRF protection.
///
/// This function checks that:
/// - The URL uses http or https scheme
/// - The host is not a private/loopback address
/// - The host is not a reserved hostname
pub fn validate_url(url: &str) -> Result<()> {
    let parsed = validate_scheme(url)?;

    let host = parsed
        .host()
        .ok_or_else(|| RssyError::Feed("URL has no host".to_string()))?;

    let ip = match host {
        url::Host::Domain(domain) => {
            if is_forbidden_hostname(domain) {
                return Err(RssyError::Feed(format!("forbidden host: {}", domain)));
            }
            return Ok(());
        }
        url::Host::Ipv4(ipv4) => IpAddr::V4(ipv4),
        url::Host::Ipv6(ipv6) => IpAddr::V6(ipv6),
    };

    if is_private_ip(&ip) {
        return Err(RssyError::Feed(format!(
            "private IP address not allowed: {}",
            ip
        )));
    }

    Ok(())
}

/// Check if a hostname is forbidden.
fn is_forbidden_hostname(host: &str) -> bool {
    let host_lower = host.to_lowercase();

    if host_lower == "localhost" {
        return true;
    }

    const FORBIDDEN_SUFFIXES: [&str; 7] = [
        ".local",
        ".localhost",
        ".internal",
        ".intranet",
        ".corp",
        ".home",
        ".lan",
    ];

    FORBIDDEN_SUFFIXES
        .iter()
        .any(|suffix| host_lower.ends_with(suffix))
}

/// Check if an IP address is private/reserved.
fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => {
            let octets = ipv4.octets();

            ipv4.is_loopback()
                || ipv4.is_private()
                || ipv4.is_link_local()
                || ipv4.is_broadcast()
                || ipv4.is_unspecified()
                // Documentation: 192.0.2.0/24, 198.51.100.0/24, 203.0.113.0/24
                || (octets[0] == 192 && octets[1] == 0 && octets[2] == 2)
                || (octets[0] == 198 && octets[1] == 51 && octets[2] == 100)
                || (octets[0] == 203 && octets[1] == 0 && octets[2] == 113)
        }
        IpAddr::V6(ipv6) => {
            let segments = ipv6.segments();

            ipv6.is_loopback()
                || ipv6.is_unspecified()
                // Unique local: fc00::/7
                || (segments[0] & 0xfe00) == 0xfc00
                // Link-local: fe80::/10
                || (segments[0] & 0xffc0) == 0xfe80
        }
    }
}

/// Parse feed bytes (RSS, Atom or JSON Feed) into a [`ParsedFeed`].
///
/// Entries without a native id keep a blank one so [`resolve_guid`] can
/// fall back to the link or title.
pub fn parse_feed(bytes: &[u8]) -> Result<ParsedFeed> {
    let feed = parser::Builder::new()
        .id_generator(|_links, _title, _uri| String::new())
        .build()
        .parse(bytes)
        .map_err(|e| RssyError::Feed(format!("failed to parse feed: {}", e)))?;

    let entries = feed.entries.into_iter().map(parse_entry).collect();

    Ok(ParsedFeed { entries })
}

/// Normalize one entry, resolving guid, author, publication time and image.
fn parse_entry(entry: Entry) -> ParsedEntry {
    let title = entry.title.as_ref().map(|t| t.content.clone());
    let link = resolve_link(&entry);
    let guid = resolve_guid(&entry.id, link.as_deref(), title.as_deref());
    let author = resolve_author(&entry);
    let image_url = resolve_image(&entry);
    let published_at = entry.published.or(entry.updated);
    let description = entry.summary.map(|t| t.content).unwrap_or_default();
    let content = entry.content.and_then(|c| c.body).unwrap_or_default();

    ParsedEntry {
        guid,
        title: title.unwrap_or_else(|| "Untitled".to_string()),
        link: link.unwrap_or_default(),
        description,
        content,
        author,
        published_at,
        image_url,
    }
}

/// The entry's article link: first alternate (or untyped) link, else the first link.
fn resolve_link(entry: &Entry) -> Option<String> {
    entry
        .links
        .iter()
        .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
        .or_else(|| entry.links.first())
        .map(|l| l.href.clone())
}

/// Feed-native id, falling back to link and then title when blank.
fn resolve_guid(id: &str, link: Option<&str>, title: Option<&str>) -> String {
    [Some(id), link, title]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .unwrap_or_default()
        .to_string()
}

/// First explicit author name, else empty.
fn resolve_author(entry: &Entry) -> String {
    entry
        .authors
        .iter()
        .map(|a| a.name.trim())
        .find(|name| !name.is_empty())
        .unwrap_or_default()
        .to_string()
}

/// Explicit image (media thumbnail), else the first image enclosure, else empty.
fn resolve_image(entry: &Entry) -> String {
    let thumbnail = entry
        .media
        .iter()
        .flat_map(|m| m.thumbnails.iter())
        .map(|t| t.image.uri.clone())
        .find(|uri| !uri.is_empty());
    if let Some(uri) = thumbnail {
        return uri;
    }

    let media_enclosure = entry
        .media
        .iter()
        .flat_map(|m| m.content.iter())
        .find(|c| {
            c.content_type
                .as_ref()
                .is_some_and(|ct| ct.to_string().starts_with("image"))
        })
        .and_then(|c| c.url.as_ref())
        .map(|u| u.to_string());
    if let Some(url) = media_enclosure {
        return url;
    }

    // Atom enclosures stay in the link list
    entry
        .links
        .iter()
        .find(|l| {
            l.rel.as_deref() == Some("enclosure")
                && l
                    .media_type
                    .as_deref()
                    .is_some_and(|t| t.starts_with("image"))
        })
        .map(|l| l.href.clone())
        .unwrap_or_default()
}
