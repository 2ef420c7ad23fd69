//! Persistence contracts for accomplishment events and mission counters
//!
//! The event store is authoritative: its atomic insert-if-absent and
//! delete-if-present are the only serialization points between concurrent
//! requests for the same (week, mission, client). The counter store holds a
//! derived per-(week, mission) aggregate that is mutated only after a winning
//! event store mutation.
//!
//! Backends:
//! - [`MongoStore`] - MongoDB collections with unique indexes
//! - [`MemoryStore`] - process-local maps for dev mode and tests

pub mod memory;
pub mod mongo;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::types::Result;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// Identity of one accomplishment claim
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventKey {
    pub week_key: String,
    pub mission_id: String,
    pub client_id: String,
}

impl EventKey {
    pub fn new(
        week_key: impl Into<String>,
        mission_id: impl Into<String>,
        client_id: impl Into<String>,
    ) -> Self {
        Self {
            week_key: week_key.into(),
            mission_id: mission_id.into(),
            client_id: client_id.into(),
        }
    }

    /// The (week, mission) pair whose counter this event contributes to
    pub fn counter_key(&self) -> CounterKey {
        CounterKey::new(&self.week_key, &self.mission_id)
    }
}

/// Identity of one mission counter
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CounterKey {
    pub week_key: String,
    pub mission_id: String,
}

impl CounterKey {
    pub fn new(week_key: impl Into<String>, mission_id: impl Into<String>) -> Self {
        Self {
            week_key: week_key.into(),
            mission_id: mission_id.into(),
        }
    }
}

/// Durable record of accomplishment claims
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Create the event unless it already exists.
    ///
    /// Returns `true` only for the call that actually created the row.
    /// Concurrent calls with the same key must not both return `true`.
    async fn try_insert(&self, key: &EventKey) -> Result<bool>;

    /// Delete the event if present.
    ///
    /// Returns `true` only for the call that actually deleted the row.
    async fn remove(&self, key: &EventKey) -> Result<bool>;

    /// Count live events per mission for a week.
    ///
    /// Missions without events are absent from the map.
    async fn tally(&self, week_key: &str) -> Result<HashMap<String, i64>>;
}

/// Derived per-(week, mission) count of distinct accomplishing clients
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically create-or-add-one. Returns the new count.
    async fn increment(&self, key: &CounterKey) -> Result<i64>;

    /// Atomically subtract one. Returns the new count, floored at 0.
    ///
    /// A counter that reaches 0 or below is deleted, never left behind.
    async fn decrement_and_prune(&self, key: &CounterKey) -> Result<i64>;

    /// Counts for the requested missions of a week, 0 for missing rows.
    async fn sum_by_mission_ids(
        &self,
        week_key: &str,
        mission_ids: &[String],
    ) -> Result<HashMap<String, i64>>;

    /// Every stored counter for a week.
    async fn week_counts(&self, week_key: &str) -> Result<HashMap<String, i64>>;

    /// Overwrite a counter only while it still holds `expected` (`None`
    /// means no row). A count of 0 or below deletes the row.
    ///
    /// Returns `false`, writing nothing, when the counter has moved.
    async fn set_count(
        &self,
        key: &CounterKey,
        expected: Option<i64>,
        count: i64,
    ) -> Result<bool>;
}

/// A backend that provides both stores plus a liveness check
#[async_trait]
pub trait StorageBackend: EventStore + CounterStore {
    /// Short backend name for logs and health output
    fn name(&self) -> &'static str;

    /// Round-trip to the persistence layer
    async fn ping(&self) -> Result<()>;
}

/// Storage handles owned by the composition root.
///
/// Built once at startup from a single backend and shared by reference with
/// every service. There is no process-global connection state.
#[derive(Clone)]
pub struct Stores {
    pub events: Arc<dyn EventStore>,
    pub counters: Arc<dyn CounterStore>,
    backend: Arc<dyn StorageBackend>,
}

impl Stores {
    pub fn new<B: StorageBackend + 'static>(backend: Arc<B>) -> Self {
        Self {
            events: backend.clone(),
            counters: backend.clone(),
            backend,
        }
    }

    /// Backend name for logs and health output
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Liveness check for the persistence layer
    pub async fn ping(&self) -> Result<()> {
        self.backend.ping().await
    }
}
