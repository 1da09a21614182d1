//! feed-relay — polls feeds of tracked accounts and relays new items to chat.
//!
//! ## Architecture overview
//!
//! ```text
//! ┌──────────────┐ every interval ┌──────────┐  fetch()   ┌──────────┐
//! │ scheduler.rs │ ─────────────► │ poll.rs  │ ─────────► │ source/  │
//! │   (rounds)   │  poll_once()   │ (Poller) │            └──────────┘
//! └──────────────┘                └──────────┘  deliver() ┌───────────┐
//!                                   │ seen.rs │ ────────► │ dispatch/ │
//!                                   └─────────┘           └───────────┘
//! ```
//!
//! * **`source/`** — the `FeedAdapter` trait and the RSS adapter.
//! * **`seen`** — per-feed memory of already-announced item ids.
//! * **`dispatch/`** — the `Dispatcher` trait, message formatting, transports.
//! * **`poll`** — one poll cycle for one feed.
//! * **`scheduler`** — runs every poller on an interval, isolating failures.
//! * **`config`** — TOML configuration.
//! * **`main`** — wires everything together: parse args, load config, start
//!   logging, and run until Ctrl-C.  SIGHUP re-reads the config file and
//!   applies each feed's `enabled` flag without a restart.

mod config;
mod dispatch;
mod error;
mod poll;
mod scheduler;
mod seen;
mod source;

#[cfg(test)]
mod testing;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use reqwest::Url;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use config::{Config, DispatcherKind};
use dispatch::{ConsoleDispatcher, Dispatcher, WebhookDispatcher};
use poll::{FeedSwitch, PollResult, Poller, TrackedFeed};
use scheduler::{Scheduler, TickOutcome};
use seen::SeenSet;
use source::{FeedAdapter, RssSource};

/// Poll feeds of tracked accounts and relay new items to chat destinations.
#[derive(Debug, Parser)]
#[command(name = "feed-relay", version, about)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, env = "FEED_RELAY_CONFIG", default_value = "feed-relay.toml")]
    config: PathBuf,

    /// Walk and record items but never deliver anything.
    #[arg(long)]
    dry_run: bool,

    /// Run a single round and exit.
    #[arg(long)]
    once: bool,

    /// Enable debug logging (overridden by RUST_LOG).
    #[arg(short, long)]
    verbose: bool,
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn build_dispatcher(config: &Config) -> Result<Arc<dyn Dispatcher>> {
    let dispatcher: Arc<dyn Dispatcher> = match config.dispatcher.kind {
        DispatcherKind::Console => Arc::new(ConsoleDispatcher::new()),
        DispatcherKind::Webhook => {
            let raw = config
                .dispatcher
                .url
                .as_deref()
                .context("webhook dispatcher needs a url")?;
            let url = Url::parse(raw).with_context(|| format!("invalid webhook url {raw:?}"))?;
            let timeout = Duration::from_secs(config.dispatcher.timeout_secs);
            Arc::new(WebhookDispatcher::new(url, timeout)?)
        }
    };
    Ok(dispatcher)
}

/// Build one poller per configured feed, in file order.
fn build_scheduler(config: &Config) -> Result<Scheduler> {
    let dispatcher = build_dispatcher(config)?;

    let mut adapters: HashMap<&str, Arc<dyn FeedAdapter>> = HashMap::new();
    for (service, source) in &config.sources {
        let timeout = Duration::from_secs(source.timeout_secs);
        let adapter = RssSource::new(service.as_str(), source.url_template.as_str(), timeout)
            .with_context(|| format!("creating source {service}"))?;
        adapters.insert(service.as_str(), Arc::new(adapter));
    }

    let mut scheduler = Scheduler::new(config.interval());
    for feed in &config.feeds {
        let adapter = adapters
            .get(feed.service.as_str())
            .with_context(|| format!("no source named {:?}", feed.service))?;
        let prime = config
            .sources
            .get(&feed.service)
            .is_some_and(|source| source.prime);
        let seen = config
            .seen_capacity
            .map(SeenSet::bounded)
            .unwrap_or_default();

        let poller = Poller::new(
            TrackedFeed::new(&feed.service, &feed.account, &feed.destination),
            Arc::clone(adapter),
            Arc::clone(&dispatcher),
        )
        .with_limit(config.fetch_limit)
        .dry_run(config.dry_run)
        .priming(prime)
        .with_seen(seen)
        .with_switch(FeedSwitch::new(feed.enabled));

        scheduler.register(poller);
    }
    Ok(scheduler)
}

/// Switch handles of every registered feed, keyed like the scheduler.
fn collect_switches(scheduler: &Scheduler, config: &Config) -> HashMap<String, FeedSwitch> {
    config
        .feeds
        .iter()
        .map(|feed| TrackedFeed::new(&feed.service, &feed.account, &feed.destination).key())
        .filter_map(|key| scheduler.switch(&key).map(|switch| (key, switch)))
        .collect()
}

/// Apply the `enabled` flags of a freshly loaded config to running feeds.
///
/// Feeds that were added or removed need a restart and are only logged.
/// Returns how many switches changed state.
fn apply_enabled_flags(config: &Config, switches: &HashMap<String, FeedSwitch>) -> usize {
    let mut changed = 0;
    for feed in &config.feeds {
        let key = TrackedFeed::new(&feed.service, &feed.account, &feed.destination).key();
        match switches.get(&key) {
            Some(switch) if switch.is_enabled() != feed.enabled => {
                switch.set_enabled(feed.enabled);
                info!(feed = %key, enabled = feed.enabled, "feed switched");
                changed += 1;
            }
            Some(_) => {}
            None => warn!(feed = %key, "new feed ignored until restart"),
        }
    }
    changed
}

/// Re-read the config on SIGHUP and flip feed switches; takes effect at the
/// next round.
#[cfg(unix)]
fn spawn_reload_listener(
    path: PathBuf,
    switches: HashMap<String, FeedSwitch>,
    shutdown: CancellationToken,
) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup()).context("installing SIGHUP handler")?;
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                received = hangup.recv() => {
                    if received.is_none() {
                        break;
                    }
                }
            }
            match Config::load(&path) {
                Ok(config) => {
                    let changed = apply_enabled_flags(&config, &switches);
                    info!(changed, "configuration reloaded");
                }
                Err(e) => error!(error = ?e, "reload failed, keeping current switches"),
            }
        }
    });
    Ok(())
}

/// Cancel `shutdown` on Ctrl-C.
fn spawn_signal_listener(shutdown: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("shutdown requested, finishing current round"),
            Err(e) => error!(error = %e, "could not listen for Ctrl-C, stopping"),
        }
        shutdown.cancel();
    });
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = Config::load(&cli.config)?;
    config.dry_run |= cli.dry_run;
    if config.dry_run {
        info!("dry run: items are recorded but nothing is delivered");
    }

    let mut scheduler = build_scheduler(&config)?;
    if scheduler.is_empty() {
        warn!("no feeds configured, nothing to poll");
    } else {
        info!(feeds = scheduler.len(), "feeds registered");
    }

    if cli.once {
        for (feed, outcome) in scheduler.run_tick().await {
            match outcome {
                TickOutcome::Finished(PollResult::Polled(report)) => {
                    info!(%feed, fetched = report.fetched, dispatched = report.dispatched, "polled")
                }
                TickOutcome::Finished(PollResult::Failed(e)) => warn!(%feed, error = %e, "failed"),
                TickOutcome::Faulted(reason) => warn!(%feed, %reason, "faulted"),
                TickOutcome::Disabled => info!(%feed, "disabled"),
            }
        }
        return Ok(());
    }

    let shutdown = CancellationToken::new();
    spawn_signal_listener(shutdown.clone());
    #[cfg(unix)]
    spawn_reload_listener(
        cli.config.clone(),
        collect_switches(&scheduler, &config),
        shutdown.clone(),
    )?;
    scheduler.run(shutdown).await;

    Ok(())
}
