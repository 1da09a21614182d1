//! TOML configuration.
//!
//! ```toml
//! interval_secs = 60
//! dry_run = false
//! fetch_limit = 1
//! seen_capacity = 10000
//!
//! [dispatcher]
//! kind = "webhook"
//! url = "https://hooks.example.org/relay"
//!
//! [sources.Twitter]
//! url_template = "https://nitter.example.org/{account}/rss"
//! prime = true
//!
//! [[feeds]]
//! service = "Twitter"
//! account = "myaccount"
//! destination = "!room:example.org"
//! ```
//!
//! [`Config::load`] parses and validates; everything downstream may assume
//! a consistent configuration.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, ensure, Context, Result};
use serde::Deserialize;

use crate::source::ACCOUNT_PLACEHOLDER;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default = "default_fetch_limit")]
    pub fetch_limit: usize,
    /// Remember at most this many ids per feed; unbounded when absent.
    #[serde(default)]
    pub seen_capacity: Option<usize>,
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    /// Keyed by service name, which is also what messages call the service.
    #[serde(default)]
    pub sources: BTreeMap<String, SourceConfig>,
    #[serde(default)]
    pub feeds: Vec<FeedConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    pub url_template: String,
    /// Record the first non-empty fetch silently instead of announcing it.
    #[serde(default)]
    pub prime: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeedConfig {
    pub service: String,
    pub account: String,
    pub destination: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatcherKind {
    #[default]
    Console,
    Webhook,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DispatcherConfig {
    #[serde(default)]
    pub kind: DispatcherKind,
    pub url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            kind: DispatcherKind::Console,
            url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_interval_secs() -> u64 {
    60
}

fn default_fetch_limit() -> usize {
    crate::poll::DEFAULT_FETCH_LIMIT
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_enabled() -> bool {
    true
}

impl Config {
    /// Read, parse and validate the file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let config: Config = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    fn validate(&self) -> Result<()> {
        ensure!(self.interval_secs > 0, "interval_secs must be greater than zero");
        ensure!(self.fetch_limit >= 1, "fetch_limit must be at least 1");
        if let Some(capacity) = self.seen_capacity {
            // A smaller set would forget ids within a single tick.
            ensure!(
                capacity >= self.fetch_limit,
                "seen_capacity ({capacity}) must be at least fetch_limit ({})",
                self.fetch_limit
            );
        }
        ensure!(
            self.dispatcher.timeout_secs > 0,
            "dispatcher timeout_secs must be greater than zero"
        );

        if self.dispatcher.kind == DispatcherKind::Webhook && self.dispatcher.url.is_none() {
            bail!("dispatcher kind \"webhook\" requires a url");
        }

        for (service, source) in &self.sources {
            ensure!(
                source.timeout_secs > 0,
                "source {service:?}: timeout_secs must be greater than zero"
            );
            ensure!(
                source.url_template.contains(ACCOUNT_PLACEHOLDER),
                "source {service:?}: url_template must contain {ACCOUNT_PLACEHOLDER}"
            );
        }

        let mut keys = HashSet::new();
        for feed in &self.feeds {
            ensure!(
                self.sources.contains_key(&feed.service),
                "feed {}: unknown service {:?}",
                feed.account,
                feed.service
            );
            ensure!(
                keys.insert((&feed.service, &feed.account, &feed.destination)),
                "feed {} of {} is configured twice for {}",
                feed.account,
                feed.service,
                feed.destination
            );
        }
        Ok(())
    }
}
