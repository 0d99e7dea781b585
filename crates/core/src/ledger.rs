// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded, id-allocating record store.
//!
//! Reads clone entries out under the read lock; writes take the write lock
//! only to append and evict. Ids are `{prefix}-{seq}` with a per-ledger
//! sequence starting at 1.

use crate::id::SeqGen;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// A value stamped with its ledger id and record time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recorded<T> {
    pub id: String,
    pub recorded_at: DateTime<Utc>,
    pub record: T,
}

#[derive(Debug)]
pub struct Ledger<T> {
    prefix: String,
    capacity: usize,
    seq: SeqGen,
    entries: RwLock<VecDeque<Recorded<T>>>,
}

impl<T: Clone> Ledger<T> {
    /// `capacity` of 0 is treated as 1.
    pub fn new(prefix: impl Into<String>, capacity: usize) -> Self {
        Self {
            prefix: prefix.into(),
            capacity: capacity.max(1),
            seq: SeqGen::new(),
            entries: RwLock::new(VecDeque::new()),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn record(&self, at: DateTime<Utc>, record: T) -> Recorded<T> {
        let entry =
            Recorded { id: format!("{}-{}", self.prefix, self.seq.next()), recorded_at: at, record };
        let mut entries = self.entries.write();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry.clone());
        entry
    }

    pub fn get(&self, id: &str) -> Option<Recorded<T>> {
        self.entries.read().iter().find(|e| e.id == id).cloned()
    }

    /// Newest first; `limit` of 0 returns everything retained.
    pub fn list(&self, limit: usize) -> Vec<Recorded<T>> {
        let entries = self.entries.read();
        let take = if limit == 0 { entries.len() } else { limit };
        entries.iter().rev().take(take).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
#[path = "ledger_tests.rs"]
mod tests;
