//! RSS feed adapter.
//!
//! Turns "latest N items of account X" into an HTTP request against a URL
//! template (`https://nitter.example.org/{account}/rss`), then parses the
//! RSS 2.0 body with the [`rss`] crate.  Use it as a template when adding
//! support for other feed formats.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Url;
use std::time::Duration;

use super::{FeedAdapter, FeedItem};
use crate::error::FetchError;

/// Placeholder substituted with the tracked account in a URL template.
pub const ACCOUNT_PLACEHOLDER: &str = "{account}";

/// An RSS data source shared by every feed of one service.
pub struct RssSource {
    /// Service label used in messages (e.g. "Twitter").
    label: String,
    /// Feed URL with an `{account}` placeholder.
    url_template: String,
    client: reqwest::Client,
}

impl RssSource {
    /// Create a new RSS source whose requests give up after `timeout`.
    pub fn new(
        label: impl Into<String>,
        url_template: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            label: label.into(),
            url_template: url_template.into(),
            client,
        })
    }

    /// Expand the URL template for one account.
    pub fn feed_url(&self, account: &str) -> Result<Url, FetchError> {
        let raw = self.url_template.replace(ACCOUNT_PLACEHOLDER, account);
        Url::parse(&raw).map_err(|e| FetchError::InvalidUrl {
            url: raw.clone(),
            reason: e.to_string(),
        })
    }

    /// Parse an already-fetched [`rss::Channel`] into at most `limit`
    /// newest-first [`FeedItem`]s.
    ///
    /// Relative item links are resolved against `base` so every returned URL
    /// is fully qualified.  Items with neither `<guid>` nor `<link>` cannot be
    /// de-duplicated and are dropped.
    ///
    /// This is a pure function (no I/O) so that tests can exercise the
    /// parsing logic without hitting the network.
    pub fn parse_channel(channel: &rss::Channel, base: &Url, limit: usize) -> Vec<FeedItem> {
        let mut items: Vec<FeedItem> = channel
            .items()
            .iter()
            .filter_map(|item| {
                let link = item.link().and_then(|l| base.join(l).ok());

                // Prefer <guid>, fall back to the raw <link>; blank values count
                // as missing.
                let id = item
                    .guid()
                    .map(|g| g.value().trim())
                    .filter(|g| !g.is_empty())
                    .or_else(|| item.link().map(str::trim).filter(|l| !l.is_empty()))?
                    .to_string();

                let text = item
                    .title()
                    .or_else(|| item.description())
                    .unwrap_or("(untitled)")
                    .trim()
                    .to_string();

                // Parse RFC-2822 date; gracefully degrade to None on failure.
                let published = item
                    .pub_date()
                    .and_then(|d| DateTime::parse_from_rfc2822(d).ok())
                    .map(|dt| dt.with_timezone(&Utc));

                let url = link.unwrap_or_else(|| base.clone()).to_string();
                Some(FeedItem {
                    published,
                    ..FeedItem::new(id, text, url)
                })
            })
            .collect();

        items.sort();
        items.truncate(limit);
        items
    }
}

#[async_trait]
impl FeedAdapter for RssSource {
    fn name(&self) -> &str {
        &self.label
    }

    async fn fetch(&self, account: &str, limit: usize) -> Result<Vec<FeedItem>, FetchError> {
        let url = self.feed_url(account)?;
        let body = self
            .client
            .get(url.clone())
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        let channel = rss::Channel::read_from(body.as_ref())?;
        Ok(Self::parse_channel(&channel, &url, limit))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
