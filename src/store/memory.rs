//! In-memory storage backend
//!
//! Per-key atomicity comes from DashMap's shard-locked entry API: the
//! existence check and the mutation happen under the same shard lock, so two
//! concurrent inserts of one key cannot both win. Nothing here survives a
//! restart or is shared between processes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use super::{CounterKey, CounterStore, EventKey, EventStore, StorageBackend};
use crate::types::{BoardError, Result};

/// Process-local backend for dev mode and tests
pub struct MemoryStore {
    events: DashMap<EventKey, DateTime<Utc>>,
    counters: DashMap<CounterKey, i64>,
    available: AtomicBool,
    counter_writes_failing: AtomicBool,
    op_count: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            events: DashMap::new(),
            counters: DashMap::new(),
            available: AtomicBool::new(true),
            counter_writes_failing: AtomicBool::new(false),
            op_count: AtomicU64::new(0),
        }
    }

    /// Simulate the persistence layer going away (or coming back)
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Fail only counter increments and decrements, leaving event writes
    /// working
    pub fn set_counter_writes_failing(&self, failing: bool) {
        self.counter_writes_failing.store(failing, Ordering::SeqCst);
    }

    /// Number of storage operations attempted so far
    pub fn op_count(&self) -> u64 {
        self.op_count.load(Ordering::SeqCst)
    }

    /// Number of live events
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Number of counter rows (zero-count rows are never stored)
    pub fn counter_rows(&self) -> usize {
        self.counters.len()
    }

    /// Creation time of an event, if it exists
    pub fn created_at(&self, key: &EventKey) -> Option<DateTime<Utc>> {
        self.events.get(key).map(|e| *e.value())
    }

    fn begin(&self) -> Result<()> {
        self.op_count.fetch_add(1, Ordering::SeqCst);
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BoardError::Storage("memory store unavailable".into()))
        }
    }

    fn begin_counter_write(&self) -> Result<()> {
        self.begin()?;
        if self.counter_writes_failing.load(Ordering::SeqCst) {
            return Err(BoardError::Storage("counter write failed".into()));
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn try_insert(&self, key: &EventKey) -> Result<bool> {
        self.begin()?;
        match self.events.entry(key.clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(Utc::now());
                Ok(true)
            }
        }
    }

    async fn remove(&self, key: &EventKey) -> Result<bool> {
        self.begin()?;
        Ok(self.events.remove(key).is_some())
    }

    async fn tally(&self, week_key: &str) -> Result<HashMap<String, i64>> {
        self.begin()?;
        let mut tally = HashMap::new();
        for entry in self.events.iter() {
            let key = entry.key();
            if key.week_key == week_key {
                *tally.entry(key.mission_id.clone()).or_insert(0) += 1;
            }
        }
        Ok(tally)
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn increment(&self, key: &CounterKey) -> Result<i64> {
        self.begin_counter_write()?;
        let mut count = self.counters.entry(key.clone()).or_insert(0);
        *count += 1;
        Ok(*count)
    }

    async fn decrement_and_prune(&self, key: &CounterKey) -> Result<i64> {
        self.begin_counter_write()?;
        match self.counters.entry(key.clone()) {
            Entry::Occupied(mut row) => {
                *row.get_mut() -= 1;
                let next = *row.get();
                if next <= 0 {
                    row.remove();
                    Ok(0)
                } else {
                    Ok(next)
                }
            }
            Entry::Vacant(_) => Ok(0),
        }
    }

    async fn sum_by_mission_ids(
        &self,
        week_key: &str,
        mission_ids: &[String],
    ) -> Result<HashMap<String, i64>> {
        self.begin()?;
        Ok(mission_ids
            .iter()
            .map(|id| {
                let count = self
                    .counters
                    .get(&CounterKey::new(week_key, id.as_str()))
                    .map(|c| *c.value())
                    .unwrap_or(0);
                (id.clone(), count)
            })
            .collect())
    }

    async fn week_counts(&self, week_key: &str) -> Result<HashMap<String, i64>> {
        self.begin()?;
        Ok(self
            .counters
            .iter()
            .filter(|c| c.key().week_key == week_key)
            .map(|c| (c.key().mission_id.clone(), *c.value()))
            .collect())
    }

    async fn set_count(
        &self,
        key: &CounterKey,
        expected: Option<i64>,
        count: i64,
    ) -> Result<bool> {
        self.begin()?;
        match (self.counters.entry(key.clone()), expected) {
            (Entry::Occupied(mut row), Some(seen)) if *row.get() == seen => {
                if count <= 0 {
                    row.remove();
                } else {
                    row.insert(count);
                }
                Ok(true)
            }
            (Entry::Vacant(slot), None) => {
                if count > 0 {
                    slot.insert(count);
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl StorageBackend for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<()> {
        self.begin()
    }
}
