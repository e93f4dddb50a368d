//! Telegram delivery sink.
//!
//! Posts each notification to the Bot API `sendMessage` method as an HTML
//! message.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::source::DeliverySink;
use super::types::Notification;
use crate::config::TelegramConfig;
use crate::{RelayError, Result};

/// Bot API response envelope.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Delivery sink posting to a Telegram chat.
pub struct TelegramSink {
    client: Client,
    endpoint: String,
}

impl TelegramSink {
    /// Create a new sink from the Telegram configuration.
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        if config.bot_token.is_empty() {
            return Err(RelayError::Config("telegram.bot_token is not set".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RelayError::Config(format!("failed to create HTTP client: {}", e)))?;

        let endpoint = format!(
            "{}/bot{}/sendMessage",
            config.api_base.trim_end_matches('/'),
            config.bot_token
        );

        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl DeliverySink for TelegramSink {
    async fn send(&self, destination: &str, notification: &Notification) -> Result<()> {
        let body = json!({
            "chat_id": destination,
            "text": format_message(notification),
            "parse_mode": "HTML",
        });

        // The endpoint embeds the bot token, keep it out of error messages
        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| RelayError::Send(e.without_url().to_string()))?;

        let status = response.status();
        let api: Option<ApiResponse> = response.json().await.ok();

        match api {
            Some(api) if status.is_success() && api.ok => {
                debug!(
                    "Delivered {} to {}",
                    notification.entry.entry_id, destination
                );
                Ok(())
            }
            Some(api) => Err(RelayError::Send(format!(
                "HTTP {}: {}",
                status,
                api.description.unwrap_or_else(|| "request rejected".to_string())
            ))),
            None => Err(RelayError::Send(format!(
                "HTTP {}: unreadable response",
                status
            ))),
        }
    }
}

/// Render a notification as a Telegram HTML message.
pub fn format_message(notification: &Notification) -> String {
    let entry = &notification.entry;
    format!(
        "{}\nURL: {}\nPublished: {}\n<i>From: {}</i>",
        escape_html(&entry.title),
        escape_html(&entry.entry_id),
        escape_html(&entry.published_at),
        escape_html(&notification.subscription_title)
    )
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::FeedEntry;

    #[test]
    fn test_format_message() {
        let n = Notification::new(
            FeedEntry::new("https://e.x/1", "Hello", "2025-01-01T00:00:00+00:00"),
            "news",
        );
        assert_eq!(
            format_message(&n),
            "Hello\nURL: https://e.x/1\nPublished: 2025-01-01T00:00:00+00:00\n<i>From: news</i>"
        );
    }

    #[test]
    fn test_format_message_escapes_markup() {
        let n = Notification::new(
            FeedEntry::new("https://e.x/?a=1&b=2", "<script> & \"quotes\"", ""),
            "a<b",
        );
        let text = format_message(&n);
        assert!(text.starts_with("&lt;script&gt; &amp; &quot;quotes&quot;\n"));
        assert!(text.contains("URL: https://e.x/?a=1&amp;b=2"));
        assert!(text.ends_with("<i>From: a&lt;b</i>"));
    }

    #[test]
    fn test_new_requires_token() {
        let result = TelegramSink::new(&TelegramConfig::default());
        assert!(matches!(result, Err(RelayError::Config(_))));
    }

    #[test]
    fn test_endpoint() {
        let config = TelegramConfig {
            bot_token: "123:abc".to_string(),
            api_base: "http://127.0.0.1:8081/".to_string(),
            ..TelegramConfig::default()
        };
        let sink = TelegramSink::new(&config).unwrap();
        assert_eq!(sink.endpoint, "http://127.0.0.1:8081/bot123:abc/sendMessage");
    }

    #[test]
    fn test_api_response_parse() {
        let ok: ApiResponse = serde_json::from_str(r#"{"ok":true,"result":{}}"#).unwrap();
        assert!(ok.ok);
        let err: ApiResponse =
            serde_json::from_str(r#"{"ok":false,"error_code":400,"description":"chat not found"}"#)
                .unwrap();
        assert!(!err.ok);
        assert_eq!(err.description.as_deref(), Some("chat not found"));
    }
}
