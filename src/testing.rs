//! Fakes shared by the unit tests of `poll` and `scheduler`.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::dispatch::Dispatcher;
use crate::error::{DispatchError, FetchError};
use crate::source::{FeedAdapter, FeedItem};

pub fn item(id: &str) -> FeedItem {
    FeedItem::new(id, format!("post {id}"), format!("https://example.com/status/{id}"))
}

pub fn items(ids: &[&str]) -> Vec<FeedItem> {
    ids.iter().map(|id| item(id)).collect()
}

/// One scripted answer of [`ScriptedAdapter`].
#[derive(Clone)]
pub enum Step {
    Items(Vec<FeedItem>),
    Fail(&'static str),
    Panic,
}

/// Adapter replaying a per-account script; the last step repeats forever.
#[derive(Default)]
pub struct ScriptedAdapter {
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    calls: AtomicUsize,
}

impl ScriptedAdapter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(self: &Arc<Self>, account: &str, steps: Vec<Step>) -> Arc<Self> {
        self.scripts
            .lock()
            .unwrap()
            .insert(account.to_string(), steps.into());
        Arc::clone(self)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_step(&self, account: &str) -> Step {
        let mut scripts = self.scripts.lock().unwrap();
        let steps = scripts.entry(account.to_string()).or_default();
        match steps.len() {
            0 => Step::Items(Vec::new()),
            1 => steps[0].clone(),
            _ => steps.pop_front().unwrap(),
        }
    }
}

#[async_trait]
impl FeedAdapter for ScriptedAdapter {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn fetch(&self, account: &str, limit: usize) -> Result<Vec<FeedItem>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.next_step(account) {
            Step::Items(mut items) => {
                items.truncate(limit);
                Ok(items)
            }
            Step::Fail(reason) => Err(FetchError::InvalidUrl {
                url: format!("scripted://{account}"),
                reason: reason.to_string(),
            }),
            Step::Panic => panic!("adapter blew up for {account}"),
        }
    }
}

/// A delivery captured by [`RecordingDispatcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub destination: String,
    pub rich: String,
    pub plain: String,
}

/// Dispatcher that records every attempt and fails for plain messages
/// containing any of the configured markers.
#[derive(Default)]
pub struct RecordingDispatcher {
    deliveries: Mutex<Vec<Delivery>>,
    attempts: AtomicUsize,
    fail_on: Vec<String>,
}

impl RecordingDispatcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_on(markers: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            fail_on: markers.iter().map(|m| m.to_string()).collect(),
            ..Self::default()
        })
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn delivered_to(&self, destination: &str) -> usize {
        self.deliveries()
            .iter()
            .filter(|d| d.destination == destination)
            .count()
    }
}

#[async_trait]
impl Dispatcher for RecordingDispatcher {
    async fn deliver(
        &self,
        destination: &str,
        rich: &str,
        plain: &str,
    ) -> Result<(), DispatchError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_on.iter().any(|m| plain.contains(m.as_str())) {
            return Err(DispatchError::Io(std::io::Error::other(format!(
                "refused: {plain}"
            ))));
        }
        self.deliveries.lock().unwrap().push(Delivery {
            destination: destination.to_string(),
            rich: rich.to_string(),
            plain: plain.to_string(),
        });
        Ok(())
    }
}
