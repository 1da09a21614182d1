//! Feed adapter abstraction layer.
//!
//! This module defines the [`FeedAdapter`] trait and the common [`FeedItem`]
//! type.  Concrete adapters live in sub-modules (currently only [`rss`]).
//!
//! ## Adding a new adapter
//!
//! 1. Create a new file in this directory (e.g. `mastodon.rs`).
//! 2. Define a struct and implement [`FeedAdapter`] for it.
//! 3. Add `mod mastodon;` below and re-export the struct.
//! 4. Build it from configuration in `main.rs`.
//!
//! The poller, de-duplication and dispatch are all adapter-agnostic.

mod feed_item;
mod rss;

pub use feed_item::FeedItem;
pub use rss::{RssSource, ACCOUNT_PLACEHOLDER};

use async_trait::async_trait;

use crate::error::FetchError;

/// Capability to fetch the latest items of one tracked account.
///
/// Pollers call [`fetch()`](FeedAdapter::fetch) once per tick.  Adapters are
/// shared between every poller of the same service, so they must be
/// [`Send`] + [`Sync`] and must enforce their own request timeouts.
#[async_trait]
pub trait FeedAdapter: Send + Sync {
    /// Label of the service, e.g. `"Twitter"`.
    fn name(&self) -> &str;

    /// Fetch at most `limit` of the most recent items for `account`.
    ///
    /// The order of the returned items carries no meaning beyond membership.
    async fn fetch(&self, account: &str, limit: usize) -> Result<Vec<FeedItem>, FetchError>;
}
