// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded ring of hash-chained events.
//!
//! Every append seals the event against the hash of the previously retained
//! event. When the ring is full the oldest event is evicted and its hash is
//! kept as the chain anchor, so integrity still verifies after eviction.
//! Subscribers receive appended events on bounded channels; a full channel
//! drops the event for that subscriber only.

use crate::event::{seal, Event, EventDraft, HASH_PREFIX};
use chrono::{DateTime, Utc};
use fleet_core::{Clock, SeqGen, SystemClock};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

pub type SubscriberId = u64;

/// Filter for [`EventStore::query`]. A `limit` of 0 means unlimited.
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    pub since: Option<DateTime<Utc>>,
    pub type_prefix: Option<String>,
    pub contains: Option<String>,
    pub limit: usize,
    pub desc: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityViolation {
    pub index: usize,
    pub expected_hash: String,
    pub got_hash: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub valid: bool,
    pub checked: usize,
    pub last_hash: String,
    pub violations: Vec<IntegrityViolation>,
}

#[derive(Default)]
struct Ring {
    events: VecDeque<Event>,
    /// Hash of the most recently evicted event ("" until something is evicted).
    anchor: String,
    subscribers: BTreeMap<SubscriberId, mpsc::Sender<Event>>,
}

impl Ring {
    fn last_hash(&self) -> &str {
        self.events.back().map(|e| e.hash.as_str()).unwrap_or(&self.anchor)
    }

    fn push(&mut self, mut event: Event, capacity: usize) -> Event {
        event.hash = seal(self.last_hash(), &event);
        if self.events.len() == capacity {
            if let Some(evicted) = self.events.pop_front() {
                self.anchor = evicted.hash;
            }
        }
        self.events.push_back(event.clone());
        event
    }

    fn broadcast(&mut self, event: &Event) {
        let mut closed = Vec::new();
        for (id, tx) in &self.subscribers {
            match tx.try_send(event.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    tracing::debug!(subscriber = id, "event subscriber full, dropping event");
                }
                Err(TrySendError::Closed(_)) => closed.push(*id),
            }
        }
        for id in closed {
            self.subscribers.remove(&id);
        }
    }
}

pub struct EventStore<C: Clock = SystemClock> {
    clock: C,
    capacity: usize,
    sub_seq: SeqGen,
    ring: RwLock<Ring>,
}

impl EventStore<SystemClock> {
    pub fn new(capacity: usize) -> Self {
        Self::with_clock(capacity, SystemClock)
    }
}

impl<C: Clock> EventStore<C> {
    /// `capacity` of 0 is treated as 1.
    pub fn with_clock(capacity: usize, clock: C) -> Self {
        Self {
            clock,
            capacity: capacity.max(1),
            sub_seq: SeqGen::new(),
            ring: RwLock::new(Ring::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.ring.read().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.read().events.is_empty()
    }

    pub fn last_hash(&self) -> String {
        self.ring.read().last_hash().to_string()
    }

    /// Seal and append an event, returning the stored copy.
    pub fn append(&self, draft: EventDraft) -> Event {
        let time = draft.time.unwrap_or_else(|| self.clock.utc());
        let event = Event {
            time,
            event_type: draft.event_type,
            message: draft.message,
            fields: draft.fields,
            hash: String::new(),
        };
        let mut ring = self.ring.write();
        let stored = ring.push(event, self.capacity);
        // Broadcast under the write lock so subscribers observe append order.
        ring.broadcast(&stored);
        stored
    }

    /// Clear the store and re-seal `events` in order, keeping their times.
    /// Any hashes carried by the input are discarded.
    pub fn replace(&self, events: impl IntoIterator<Item = Event>) {
        let mut ring = self.ring.write();
        ring.events.clear();
        ring.anchor.clear();
        for event in events {
            ring.push(event, self.capacity);
        }
        tracing::info!(retained = ring.events.len(), "event log replaced and re-sealed");
    }

    pub fn query(&self, q: &EventQuery) -> Vec<Event> {
        let needle = q.contains.as_ref().map(|s| s.to_lowercase());
        let ring = self.ring.read();
        let matches = |e: &&Event| {
            q.since.map_or(true, |since| e.time >= since)
                && q.type_prefix.as_deref().map_or(true, |p| e.event_type.starts_with(p))
                && needle.as_deref().map_or(true, |n| e.message.to_lowercase().contains(n))
        };
        let limit = if q.limit == 0 { usize::MAX } else { q.limit };
        if q.desc {
            ring.events.iter().rev().filter(matches).take(limit).cloned().collect()
        } else {
            ring.events.iter().filter(matches).take(limit).cloned().collect()
        }
    }

    /// Register a subscriber with a bounded buffer (minimum 1).
    pub fn subscribe(&self, buffer: usize) -> (SubscriberId, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let id = self.sub_seq.next();
        self.ring.write().subscribers.insert(id, tx);
        (id, rx)
    }

    /// Drop the subscriber's sender, closing its channel. Returns whether it existed.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.ring.write().subscribers.remove(&id).is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        self.ring.read().subscribers.len()
    }

    /// Walk the retained chain recomputing every hash.
    pub fn verify_integrity(&self) -> IntegrityReport {
        let ring = self.ring.read();
        let mut prev = ring.anchor.clone();
        let mut violations = Vec::new();
        for (index, event) in ring.events.iter().enumerate() {
            let expected = seal(&prev, event);
            let reason = if !event.hash.starts_with(HASH_PREFIX) {
                Some("malformed hash prefix")
            } else if event.hash != expected {
                Some("hash mismatch")
            } else {
                None
            };
            if let Some(reason) = reason {
                violations.push(IntegrityViolation {
                    index,
                    expected_hash: expected,
                    got_hash: event.hash.clone(),
                    reason: reason.to_string(),
                });
            }
            prev = event.hash.clone();
        }
        if !violations.is_empty() {
            tracing::warn!(violations = violations.len(), "event chain integrity violated");
        }
        IntegrityReport {
            valid: violations.is_empty(),
            checked: ring.events.len(),
            last_hash: ring.last_hash().to_string(),
            violations,
        }
    }

    /// Mutate a retained event in place without re-sealing.
    #[cfg(any(test, feature = "test-support"))]
    pub fn tamper_with(&self, index: usize, f: impl FnOnce(&mut Event)) -> bool {
        match self.ring.write().events.get_mut(index) {
            Some(event) => {
                f(event);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
#[path = "event_log_tests.rs"]
mod tests;
