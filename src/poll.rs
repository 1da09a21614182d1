//! One poll cycle for one tracked feed.
//!
//! A [`Poller`] binds a [`TrackedFeed`] to the adapter that fetches it, the
//! dispatcher that announces new items, and the [`SeenSet`] that remembers
//! what was already announced.  [`Poller::poll_once`] never returns an error:
//! every failure is logged on the poller's span and reported in the
//! [`PollResult`], so the scheduler can simply move on.
//!
//! Per tick the poller goes `Idle → Fetching → Filtering → Dispatching →
//! Idle`; a fetch error jumps straight back to `Idle` and the next tick
//! starts over.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, error, info, Instrument, Span};

use crate::dispatch::{Dispatcher, Message};
use crate::error::FetchError;
use crate::seen::SeenSet;
use crate::source::FeedAdapter;

/// Items requested per tick unless configured otherwise.
pub const DEFAULT_FETCH_LIMIT: usize = 1;

/// One polling target: an account on a service, announced to a destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedFeed {
    /// Human-readable service name, used in messages (e.g. "Twitter").
    pub service: String,
    /// Account identifier on the source.
    pub account: String,
    /// Destination channel identifier.
    pub destination: String,
}

impl TrackedFeed {
    pub fn new(
        service: impl Into<String>,
        account: impl Into<String>,
        destination: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            account: account.into(),
            destination: destination.into(),
        }
    }

    /// Stable key identifying this feed in the scheduler.
    pub fn key(&self) -> String {
        format!("{}:{}@{}", self.service, self.account, self.destination)
    }
}

/// Shared enabled flag of one feed.
///
/// Clones share the same flag; flipping it takes effect at the next tick.
#[derive(Debug, Clone)]
pub struct FeedSwitch(Arc<AtomicBool>);

impl FeedSwitch {
    pub fn new(enabled: bool) -> Self {
        Self(Arc::new(AtomicBool::new(enabled)))
    }

    pub fn is_enabled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.0.store(enabled, Ordering::Relaxed);
    }
}

/// Counters for one completed tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollReport {
    /// Items returned by the adapter.
    pub fetched: usize,
    /// Items not seen before this tick (now recorded).
    pub fresh: usize,
    /// Messages delivered successfully.
    pub dispatched: usize,
    /// Deliveries that failed; those items are recorded anyway.
    pub undelivered: usize,
}

/// Outcome of [`Poller::poll_once`].
#[derive(Debug)]
pub enum PollResult {
    Polled(PollReport),
    /// The adapter failed; nothing was recorded this tick.
    Failed(FetchError),
}

pub struct Poller {
    feed: TrackedFeed,
    adapter: Arc<dyn FeedAdapter>,
    dispatcher: Arc<dyn Dispatcher>,
    seen: SeenSet,
    switch: FeedSwitch,
    limit: usize,
    send_messages: bool,
    /// Record silently while nothing has been seen yet.
    prime: bool,
    span: Span,
}

impl Poller {
    pub fn new(
        feed: TrackedFeed,
        adapter: Arc<dyn FeedAdapter>,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Self {
        let span = tracing::info_span!(
            "feed",
            adapter = adapter.name(),
            service = %feed.service,
            account = %feed.account,
            destination = %feed.destination,
        );
        Self {
            feed,
            adapter,
            dispatcher,
            seen: SeenSet::new(),
            switch: FeedSwitch::new(true),
            limit: DEFAULT_FETCH_LIMIT,
            send_messages: true,
            prime: false,
            span,
        }
    }

    /// Request up to `limit` items per tick (at least one).
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.max(1);
        self
    }

    /// Walk and record items but never call the dispatcher.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.send_messages = !dry_run;
        self
    }

    /// Silently record whatever the first non-empty fetch returns.
    pub fn priming(mut self, prime: bool) -> Self {
        self.prime = prime;
        self
    }

    pub fn with_seen(mut self, seen: SeenSet) -> Self {
        self.seen = seen;
        self
    }

    pub fn with_switch(mut self, switch: FeedSwitch) -> Self {
        self.switch = switch;
        self
    }

    pub fn feed(&self) -> &TrackedFeed {
        &self.feed
    }

    pub fn switch(&self) -> &FeedSwitch {
        &self.switch
    }

    #[cfg(test)]
    pub fn seen(&self) -> &SeenSet {
        &self.seen
    }

    /// Run exactly one poll cycle.  Not reentrant: `&mut self` keeps two
    /// ticks of the same feed from overlapping.
    pub async fn poll_once(&mut self) -> PollResult {
        let span = self.span.clone();
        self.poll_inner().instrument(span).await
    }

    async fn poll_inner(&mut self) -> PollResult {
        let items = match self.adapter.fetch(&self.feed.account, self.limit).await {
            Ok(items) => items,
            Err(e) => {
                error!(error = ?e, "Polling {} account {} failed", self.feed.service, self.feed.account);
                return PollResult::Failed(e);
            }
        };
        info!(
            "Polling {} account {} - got {} items",
            self.feed.service,
            self.feed.account,
            items.len()
        );

        let priming = self.prime && self.seen.is_empty();
        let announce = self.send_messages && !priming;
        if priming {
            debug!("priming tick, recording without announcing");
        }

        let mut report = PollReport {
            fetched: items.len(),
            ..PollReport::default()
        };

        for item in &items {
            // Also catches an id repeated inside this same batch.
            if self.seen.contains(&item.id) {
                continue;
            }
            report.fresh += 1;

            if announce {
                let message = Message::for_item(&self.feed.service, &self.feed.account, item);
                match self
                    .dispatcher
                    .deliver(&self.feed.destination, &message.rich, &message.plain)
                    .await
                {
                    Ok(()) => report.dispatched += 1,
                    Err(e) => {
                        report.undelivered += 1;
                        error!(item = %item.id, error = ?e, "delivery failed, item will not be retried");
                    }
                }
            }

            // Recorded only after the delivery attempt.
            self.seen.record(&item.id);
        }

        debug!(?report, seen = self.seen.len(), "tick complete");
        PollResult::Polled(report)
    }
}
