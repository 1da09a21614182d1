//! The item type shared by every feed adapter.
//!
//! `FeedItem` is one unit of content fetched for a tracked account.  Every
//! adapter converts its native format into `FeedItem`s so that the poller
//! (de-duplication, formatting, dispatch) stays source-agnostic.
//!
//! Items are ephemeral: they only live for the duration of one poll tick.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;

/// A single fetched entry, normalised from any feed adapter.
///
/// ## Sorting
///
/// `FeedItem` implements [`Ord`] for **newest-first** ordering so adapters
/// can sort and truncate to "the latest N".  Items without a date sort last.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct FeedItem {
    /// Identifier used for de-duplication, unique per source.
    ///
    /// Sources with numeric ids should render them as decimal strings.
    pub id: String,

    /// Display text (headline, tweet body, ...).
    pub text: String,

    /// Fully-qualified URL of the item.
    pub url: String,

    /// Publication timestamp, used only for sorting.
    pub published: Option<DateTime<Utc>>,
}

impl FeedItem {
    pub fn new(id: impl Into<String>, text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            url: url.into(),
            published: None,
        }
    }
}

impl Ord for FeedItem {
    fn cmp(&self, other: &Self) -> Ordering {
        // `other` first so that `Some(newer) > Some(older)` gives us newest-first.
        // `None` is less than `Some(_)`, so undated items sink to the bottom.
        other.published.cmp(&self.published)
    }
}

impl PartialOrd for FeedItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
