//! Per-feed memory of already-notified item ids.
//!
//! A [`SeenSet`] is owned by exactly one poller and is never shared, so it
//! needs no locking.  It is append-only: ids are never removed, except that
//! a [`bounded`](SeenSet::bounded) set forgets its oldest id once it is full.
//! Nothing is persisted; a restart starts from an empty set.

use std::collections::{HashSet, VecDeque};

#[derive(Debug, Default)]
pub struct SeenSet {
    ids: HashSet<String>,
    /// Insertion order, only maintained when a capacity is set.
    order: VecDeque<String>,
    capacity: Option<usize>,
}

impl SeenSet {
    /// An unbounded set.
    pub fn new() -> Self {
        Self::default()
    }

    /// A set that evicts its oldest id when more than `capacity` ids are
    /// recorded.  A capacity of zero is treated as one.
    pub fn bounded(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity.max(1)),
            ..Self::default()
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Record `id`.  Returns `false` if it was already present (no-op).
    pub fn record(&mut self, id: &str) -> bool {
        if !self.ids.insert(id.to_string()) {
            return false;
        }
        if let Some(capacity) = self.capacity {
            self.order.push_back(id.to_string());
            while self.order.len() > capacity {
                if let Some(oldest) = self.order.pop_front() {
                    self.ids.remove(&oldest);
                }
            }
        }
        true
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
