//! Drives every poller on a fixed interval until shutdown.
//!
//! Each round starts all enabled pollers in registration order and runs them
//! concurrently on the scheduler's task, so a slow fetch for one feed does
//! not hold up the others.  The next round only begins once every poller of
//! the current round is back to idle, so two ticks of the same feed never
//! overlap.  Drift caused by slow rounds is not corrected.
//!
//! Shutdown is cooperative: cancelling the token stops future rounds, while
//! an in-flight round finishes on its own (adapters and dispatchers carry
//! their own timeouts).

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::future::join_all;
use futures::FutureExt;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::poll::{FeedSwitch, PollResult, Poller};

/// What happened to one feed during one round.
#[derive(Debug)]
pub enum TickOutcome {
    /// The feed's switch was off.
    Disabled,
    Finished(PollResult),
    /// `poll_once` panicked; the payload message is kept for logging.
    Faulted(String),
}

pub struct Scheduler {
    pollers: Vec<Poller>,
    interval: Duration,
}

impl Scheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            pollers: Vec::new(),
            interval,
        }
    }

    /// Register a poller.  Rounds visit pollers in registration order.
    pub fn register(&mut self, poller: Poller) {
        debug!(feed = %poller.feed().key(), "registered feed");
        self.pollers.push(poller);
    }

    pub fn len(&self) -> usize {
        self.pollers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pollers.is_empty()
    }

    /// The enabled flag of the feed registered under `key`.
    pub fn switch(&self, key: &str) -> Option<FeedSwitch> {
        self.pollers
            .iter()
            .find(|p| p.feed().key() == key)
            .map(|p| p.switch().clone())
    }

    /// Run one round and return each feed's outcome in registration order.
    pub async fn run_tick(&mut self) -> Vec<(String, TickOutcome)> {
        let round = self.pollers.iter_mut().map(|poller| async move {
            let key = poller.feed().key();
            if !poller.switch().is_enabled() {
                debug!(feed = %key, "feed disabled, skipping");
                return (key, TickOutcome::Disabled);
            }

            let outcome = match AssertUnwindSafe(poller.poll_once()).catch_unwind().await {
                Ok(result) => TickOutcome::Finished(result),
                Err(payload) => {
                    let reason = panic_message(payload.as_ref());
                    error!(feed = %key, %reason, "poller panicked, continuing with other feeds");
                    TickOutcome::Faulted(reason)
                }
            };
            (key, outcome)
        });

        join_all(round).await
    }

    /// Run rounds every `interval` until `shutdown` is cancelled.
    ///
    /// The first round starts immediately.
    pub async fn run(&mut self, shutdown: CancellationToken) {
        let mut timer = tokio::time::interval(self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            feeds = self.pollers.len(),
            interval_secs = self.interval.as_secs(),
            "scheduler started"
        );

        let mut rounds: u64 = 0;
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = timer.tick() => {}
            }

            rounds += 1;
            let outcomes = self.run_tick().await;
            log_round(rounds, &outcomes);
        }

        info!(rounds, "scheduler stopped");
    }
}

fn log_round(round: u64, outcomes: &[(String, TickOutcome)]) {
    let mut dispatched = 0;
    let mut failed = 0;
    for (_, outcome) in outcomes {
        match outcome {
            TickOutcome::Finished(PollResult::Polled(report)) => dispatched += report.dispatched,
            TickOutcome::Finished(PollResult::Failed(_)) | TickOutcome::Faulted(_) => failed += 1,
            TickOutcome::Disabled => {}
        }
    }
    if failed > 0 {
        warn!(round, dispatched, failed, "round finished with failures");
    } else {
        debug!(round, dispatched, "round finished");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::poll::TrackedFeed;
    use crate::source::{FeedAdapter, FeedItem};
    use crate::testing::{items, RecordingDispatcher, ScriptedAdapter, Step};
    use async_trait::async_trait;
    use std::sync::Arc;
    use tokio::time::Instant;

    const INTERVAL: Duration = Duration::from_secs(60);

    fn scheduler_for(
        adapter: &Arc<ScriptedAdapter>,
        dispatcher: &Arc<RecordingDispatcher>,
        accounts: &[&str],
    ) -> Scheduler {
        let mut scheduler = Scheduler::new(INTERVAL);
        for account in accounts {
            scheduler.register(
                Poller::new(
                    TrackedFeed::new("Twitter", *account, format!("room-{account}")),
                    adapter.clone(),
                    dispatcher.clone(),
                )
                .with_limit(5),
            );
        }
        scheduler
    }

    #[tokio::test]
    async fn failing_feed_does_not_stop_the_others() {
        let adapter = ScriptedAdapter::new()
            .script("a", vec![Step::Fail("503")])
            .script("b", vec![Step::Items(items(&["1"]))]);
        let dispatcher = RecordingDispatcher::new();
        let mut scheduler = scheduler_for(&adapter, &dispatcher, &["a", "b"]);

        let outcomes = scheduler.run_tick().await;

        assert!(matches!(
            outcomes[0].1,
            TickOutcome::Finished(PollResult::Failed(_))
        ));
        assert!(matches!(
            outcomes[1].1,
            TickOutcome::Finished(PollResult::Polled(_))
        ));
        assert_eq!(dispatcher.delivered_to("room-b"), 1);
    }

    #[tokio::test]
    async fn panicking_feed_is_contained_every_round() {
        let adapter = ScriptedAdapter::new()
            .script("a", vec![Step::Panic])
            .script("b", vec![Step::Items(items(&["1"])), Step::Items(items(&["2"]))]);
        let dispatcher = RecordingDispatcher::new();
        let mut scheduler = scheduler_for(&adapter, &dispatcher, &["a", "b"]);

        let first = scheduler.run_tick().await;
        let second = scheduler.run_tick().await;

        match &first[0].1 {
            TickOutcome::Faulted(reason) => assert!(reason.contains("adapter blew up")),
            other => panic!("expected fault, got {other:?}"),
        }
        assert!(matches!(second[0].1, TickOutcome::Faulted(_)));
        assert_eq!(dispatcher.delivered_to("room-b"), 2);
    }

    #[tokio::test]
    async fn outcomes_follow_registration_order() {
        let adapter = ScriptedAdapter::new();
        let dispatcher = RecordingDispatcher::new();
        let mut scheduler = scheduler_for(&adapter, &dispatcher, &["c", "a", "b"]);

        let keys: Vec<_> = scheduler
            .run_tick()
            .await
            .into_iter()
            .map(|(key, _)| key)
            .collect();

        assert_eq!(
            keys,
            [
                "Twitter:c@room-c",
                "Twitter:a@room-a",
                "Twitter:b@room-b",
            ]
        );
    }

    #[tokio::test]
    async fn disabled_feed_is_skipped_until_switched_back_on() {
        let adapter = ScriptedAdapter::new()
            .script("a", vec![Step::Items(items(&["1"]))])
            .script("b", vec![Step::Items(items(&["2"]))]);
        let dispatcher = RecordingDispatcher::new();
        let mut scheduler = scheduler_for(&adapter, &dispatcher, &["a", "b"]);
        let switch = scheduler.switch("Twitter:a@room-a").unwrap();

        switch.set_enabled(false);
        let outcomes = scheduler.run_tick().await;
        assert!(matches!(outcomes[0].1, TickOutcome::Disabled));
        assert_eq!(adapter.calls(), 1);
        assert_eq!(dispatcher.delivered_to("room-a"), 0);

        switch.set_enabled(true);
        scheduler.run_tick().await;
        assert_eq!(dispatcher.delivered_to("room-a"), 1);
    }

    #[test]
    fn unknown_key_has_no_switch() {
        let scheduler = Scheduler::new(INTERVAL);

        assert!(scheduler.switch("nope").is_none());
        assert!(scheduler.is_empty());
    }

    /// Adapter whose every fetch takes `delay` before returning one item.
    struct SlowAdapter {
        delay: Duration,
    }

    #[async_trait]
    impl FeedAdapter for SlowAdapter {
        fn name(&self) -> &str {
            "slow"
        }

        async fn fetch(&self, account: &str, _limit: usize) -> Result<Vec<FeedItem>, FetchError> {
            tokio::time::sleep(self.delay).await;
            Ok(items(&[account]))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_feeds_in_one_round_wait_in_parallel() {
        let adapter = Arc::new(SlowAdapter {
            delay: Duration::from_secs(10),
        });
        let dispatcher = RecordingDispatcher::new();
        let mut scheduler = Scheduler::new(INTERVAL);
        for account in ["a", "b"] {
            scheduler.register(Poller::new(
                TrackedFeed::new("Twitter", account, "room"),
                adapter.clone(),
                dispatcher.clone(),
            ));
        }

        let started = Instant::now();
        scheduler.run_tick().await;
        let elapsed = started.elapsed();

        assert!(elapsed >= Duration::from_secs(10));
        assert!(elapsed < Duration::from_secs(20), "round took {elapsed:?}");
        assert_eq!(dispatcher.delivered_to("room"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn run_ticks_on_interval_until_cancelled() {
        let adapter = ScriptedAdapter::new().script(
            "a",
            vec![
                Step::Items(items(&["1"])),
                Step::Items(items(&["2"])),
                Step::Items(items(&["3"])),
            ],
        );
        let dispatcher = RecordingDispatcher::new();
        let mut scheduler = scheduler_for(&adapter, &dispatcher, &["a"]);
        let shutdown = CancellationToken::new();

        let stopper = {
            let shutdown = shutdown.clone();
            async move {
                // Rounds fire at 0s, 60s and 120s.
                tokio::time::sleep(Duration::from_secs(150)).await;
                shutdown.cancel();
            }
        };
        tokio::join!(scheduler.run(shutdown.clone()), stopper);

        assert_eq!(adapter.calls(), 3);
        assert_eq!(dispatcher.deliveries().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_before_start_runs_no_round() {
        let adapter = ScriptedAdapter::new();
        let dispatcher = RecordingDispatcher::new();
        let mut scheduler = scheduler_for(&adapter, &dispatcher, &["a"]);
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        scheduler.run(shutdown).await;

        assert_eq!(adapter.calls(), 0);
    }
}
