//! HTTP snapshot source.
//!
//! Fetches RSS/Atom documents with reqwest and parses them with feed-rs,
//! enforcing timeouts, a redirect limit, a size limit and (unless disabled)
//! refusing loopback and private-network hosts.

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use feed_rs::parser;
use reqwest::Client;
use tracing::debug;

use super::source::SnapshotSource;
use super::types::FeedEntry;
use crate::config::FetchConfig;
use crate::{RelayError, Result};

/// User agent string for feed fetching.
const USER_AGENT: &str = concat!("feedrelay/", env!("CARGO_PKG_VERSION"));

/// Snapshot source backed by HTTP.
pub struct HttpFeedSource {
    client: Client,
    max_feed_size: u64,
    allow_private_hosts: bool,
}

impl HttpFeedSource {
    /// Create a new source from the fetch configuration.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| RelayError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            max_feed_size: config.max_feed_size_bytes,
            allow_private_hosts: config.allow_private_hosts,
        })
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        validate_url(url, self.allow_private_hosts)?;

        let response = self.client.get(url).send().await.map_err(request_error)?;

        if !response.status().is_success() {
            return Err(RelayError::Fetch(format!("HTTP error: {}", response.status())));
        }

        if let Some(content_length) = response.content_length() {
            if content_length > self.max_feed_size {
                return Err(too_large(content_length, self.max_feed_size));
            }
        }

        let bytes = response.bytes().await.map_err(request_error)?;
        if bytes.len() as u64 > self.max_feed_size {
            return Err(too_large(bytes.len() as u64, self.max_feed_size));
        }

        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl SnapshotSource for HttpFeedSource {
    async fn fetch(&self, source: &str) -> Result<Vec<FeedEntry>> {
        let body = self.download(source).await?;
        let entries = parse_feed(&body)?;
        debug!("Fetched {} entries from {}", entries.len(), source);
        Ok(entries)
    }
}

fn request_error(e: reqwest::Error) -> RelayError {
    if e.is_timeout() {
        RelayError::Fetch(format!("request timed out: {}", e))
    } else {
        RelayError::Fetch(format!("failed to fetch feed: {}", e))
    }
}

fn too_large(size: u64, max: u64) -> RelayError {
    RelayError::Fetch(format!(
        "feed too large: {} bytes (max {} bytes)",
        size, max
    ))
}

/// Parse a feed document into entries, keeping document order.
///
/// The entry ID is the entry's first link, falling back to the feed's own
/// entry id when there is no link. The timestamp is the published date,
/// else the updated date, as RFC 3339; empty when the feed gives neither.
pub fn parse_feed(bytes: &[u8]) -> Result<Vec<FeedEntry>> {
    let feed =
        parser::parse(bytes).map_err(|e| RelayError::Fetch(format!("failed to parse feed: {}", e)))?;

    let entries = feed
        .entries
        .into_iter()
        .map(|entry| {
            let entry_id = entry
                .links
                .first()
                .map(|l| l.href.clone())
                .filter(|href| !href.is_empty())
                .unwrap_or(entry.id);
            let title = entry.title.map(|t| t.content).unwrap_or_default();
            let published_at = entry
                .published
                .or(entry.updated)
                .map(|d| d.to_rfc3339())
                .unwrap_or_default();

            FeedEntry {
                entry_id,
                title,
                published_at,
            }
        })
        .collect();

    Ok(entries)
}

/// Validate a feed URL.
///
/// Only http and https are accepted. Unless `allow_private` is set, the
/// host must not be a loopback, private or link-local address or a
/// local-only hostname.
pub fn validate_url(url: &str, allow_private: bool) -> Result<()> {
    let parsed =
        url::Url::parse(url).map_err(|e| RelayError::Fetch(format!("invalid URL: {}", e)))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(RelayError::Fetch(format!(
                "unsupported URL scheme: {}",
                scheme
            )));
        }
    }

    let host = parsed
        .host()
        .ok_or_else(|| RelayError::Fetch("URL has no host".to_string()))?;

    if allow_private {
        return Ok(());
    }

    match host {
        url::Host::Domain(domain) if is_local_hostname(domain) => {
            Err(RelayError::Fetch(format!("forbidden host: {}", domain)))
        }
        url::Host::Ipv4(ip) if is_private_ip(&IpAddr::V4(ip)) => Err(RelayError::Fetch(
            format!("private IP address not allowed: {}", ip),
        )),
        url::Host::Ipv6(ip) if is_private_ip(&IpAddr::V6(ip)) => Err(RelayError::Fetch(
            format!("private IP address not allowed: {}", ip),
        )),
        _ => Ok(()),
    }
}

fn is_local_hostname(host: &str) -> bool {
    let host = host.to_lowercase();
    host == "localhost"
        || [".local", ".localhost", ".internal", ".lan"]
            .iter()
            .any(|suffix| host.ends_with(suffix))
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
        }
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                // Unique local fc00::/7
                || (first & 0xfe00) == 0xfc00
                // Link-local fe80::/10
                || (first & 0xffc0) == 0xfe80
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url_accepts_public_http() {
        assert!(validate_url("https://example.com/feed.xml", false).is_ok());
        assert!(validate_url("http://93.184.216.34/rss", false).is_ok());
    }

    #[test]
    fn test_validate_url_rejects_scheme() {
        let result = validate_url("ftp://example.com/feed.xml", false);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("unsupported URL scheme"));
        assert!(validate_url("not a url", false).is_err());
    }

    #[test]
    fn test_validate_url_rejects_local_hosts() {
        for url in [
            "http://localhost/feed.xml",
            "http://printer.local/feed",
            "http://api.internal/feed",
        ] {
            let err = validate_url(url, false).unwrap_err().to_string();
            assert!(err.contains("forbidden host"), "{url}: {err}");
        }
    }

    #[test]
    fn test_validate_url_rejects_private_ips() {
        for url in [
            "http://127.0.0.1/feed",
            "http://10.1.2.3/feed",
            "http://172.16.0.1/feed",
            "http://192.168.1.1/feed",
            "http://169.254.1.1/feed",
            "http://[::1]/feed",
            "http://[fd00::1]/feed",
        ] {
            let err = validate_url(url, false).unwrap_err().to_string();
            assert!(err.contains("private IP"), "{url}: {err}");
        }
        assert!(validate_url("http://172.32.0.1/feed", false).is_ok());
    }

    #[test]
    fn test_validate_url_allow_private() {
        assert!(validate_url("http://localhost:8080/feed", true).is_ok());
        assert!(validate_url("http://192.168.1.1/feed", true).is_ok());
        // Scheme is still enforced
        assert!(validate_url("file:///etc/passwd", true).is_err());
    }

    #[test]
    fn test_is_local_hostname() {
        assert!(is_local_hostname("localhost"));
        assert!(is_local_hostname("LOCALHOST"));
        assert!(is_local_hostname("nas.lan"));
        assert!(!is_local_hostname("localhost.example.com"));
        assert!(!is_local_hostname("news.ycombinator.com"));
    }

    #[test]
    fn test_parse_feed_rss_uses_link_as_id() {
        let rss = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Test Feed</title>
    <link>https://example.com</link>
    <item>
      <title>Second</title>
      <link>https://example.com/2</link>
      <guid>guid-2</guid>
      <pubDate>Tue, 02 Jan 2024 10:00:00 GMT</pubDate>
    </item>
    <item>
      <title>First</title>
      <link>https://example.com/1</link>
      <guid>guid-1</guid>
      <pubDate>Mon, 01 Jan 2024 10:00:00 GMT</pubDate>
    </item>
  </channel>
</rss>"#;

        let entries = parse_feed(rss.as_bytes()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].entry_id, "https://example.com/2");
        assert_eq!(entries[0].title, "Second");
        assert!(entries[0].published_at.starts_with("2024-01-02T10:00:00"));
        assert_eq!(entries[1].entry_id, "https://example.com/1");
    }

    #[test]
    fn test_parse_feed_atom() {
        let atom = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Feed</title>
  <id>urn:feed</id>
  <updated>2025-01-01T00:00:00Z</updated>
  <entry>
    <id>urn:uuid:1</id>
    <title>Atom Entry</title>
    <link href="https://example.com/entry"/>
    <updated>2025-01-01T00:00:00Z</updated>
  </entry>
</feed>"#;

        let entries = parse_feed(atom.as_bytes()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].entry_id, "https://example.com/entry");
        assert_eq!(entries[0].title, "Atom Entry");
        assert!(entries[0].published_at.starts_with("2025-01-01T00:00:00"));
    }

    #[test]
    fn test_parse_feed_without_link_falls_back_to_id() {
        let rss = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <item>
      <guid>only-guid</guid>
    </item>
  </channel>
</rss>"#;

        let entries = parse_feed(rss.as_bytes()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].entry_id, "only-guid");
        assert_eq!(entries[0].title, "");
        assert_eq!(entries[0].published_at, "");
    }

    #[test]
    fn test_parse_feed_empty_channel() {
        let rss = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>Nothing</title></channel></rss>"#;
        assert!(parse_feed(rss.as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn test_parse_feed_invalid() {
        let result = parse_feed(b"This is not XML");
        assert!(matches!(result, Err(RelayError::Fetch(_))));
    }

    #[test]
    fn test_new_source() {
        assert!(HttpFeedSource::new(&FetchConfig::default()).is_ok());
    }
}
