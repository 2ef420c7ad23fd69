//! Accomplish service - idempotent claim and retract
//!
//! Per (week, mission, client) a claim is either `unclaimed` or `claimed`.
//! The event store's atomic insert/delete decides which caller performs a
//! transition; only that caller touches the counter. Duplicate and racing
//! requests observe `counted = false` / `removed = false` and leave the
//! counter alone.
//!
//! There is no rollback: if the counter write fails after the event write
//! succeeded, the error propagates and the counter lags the events until a
//! reconcile pass (see [`super::ReconcileService`]).

use std::sync::Arc;
use tracing::{debug, error, info};

use crate::store::{CounterStore, EventKey, EventStore, Stores};
use crate::types::{BoardError, Result};

/// Result of a claim
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimOutcome {
    /// Whether this call created the event and incremented the counter
    pub counted: bool,
}

/// Result of a retraction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetractOutcome {
    /// Whether this call deleted the event and decremented the counter
    pub removed: bool,
}

/// Build a validated event key, rejecting empty identifiers
pub fn validate_key(week_key: &str, mission_id: &str, client_id: &str) -> Result<EventKey> {
    let missing: Vec<&str> = [
        ("weekKey", week_key),
        ("missionId", mission_id),
        ("clientId", client_id),
    ]
    .iter()
    .filter(|(_, value)| value.is_empty())
    .map(|(name, _)| *name)
    .collect();

    if !missing.is_empty() {
        return Err(BoardError::InvalidArgument(format!(
            "Missing {}",
            missing.join("/")
        )));
    }

    Ok(EventKey::new(week_key, mission_id, client_id))
}

/// Orchestrates the event store and counter store
#[derive(Clone)]
pub struct AccomplishService {
    events: Arc<dyn EventStore>,
    counters: Arc<dyn CounterStore>,
}

impl AccomplishService {
    pub fn new(stores: &Stores) -> Self {
        Self {
            events: Arc::clone(&stores.events),
            counters: Arc::clone(&stores.counters),
        }
    }

    /// Mark a mission accomplished for a client.
    ///
    /// Any number of calls, sequential or concurrent, add exactly one to the
    /// counter in total.
    pub async fn claim(
        &self,
        week_key: &str,
        mission_id: &str,
        client_id: &str,
    ) -> Result<ClaimOutcome> {
        let key = validate_key(week_key, mission_id, client_id)?;

        if !self.events.try_insert(&key).await? {
            debug!(
                week_key = %key.week_key,
                mission_id = %key.mission_id,
                client_id = %key.client_id,
                "Duplicate claim ignored"
            );
            return Ok(ClaimOutcome { counted: false });
        }

        let count = self
            .counters
            .increment(&key.counter_key())
            .await
            .inspect_err(|e| {
                error!(
                    week_key = %key.week_key,
                    mission_id = %key.mission_id,
                    error = %e,
                    "Event recorded but counter increment failed"
                )
            })?;

        info!(
            week_key = %key.week_key,
            mission_id = %key.mission_id,
            count,
            "Claim counted"
        );
        Ok(ClaimOutcome { counted: true })
    }

    /// Undo a previous claim.
    ///
    /// Retracting an unclaimed triple is a no-op; the counter never goes
    /// below zero.
    pub async fn retract(
        &self,
        week_key: &str,
        mission_id: &str,
        client_id: &str,
    ) -> Result<RetractOutcome> {
        let key = validate_key(week_key, mission_id, client_id)?;

        if !self.events.remove(&key).await? {
            debug!(
                week_key = %key.week_key,
                mission_id = %key.mission_id,
                client_id = %key.client_id,
                "Retract of unclaimed mission ignored"
            );
            return Ok(RetractOutcome { removed: false });
        }

        let count = self
            .counters
            .decrement_and_prune(&key.counter_key())
            .await
            .inspect_err(|e| {
                error!(
                    week_key = %key.week_key,
                    mission_id = %key.mission_id,
                    error = %e,
                    "Event removed but counter decrement failed"
                )
            })?;

        info!(
            week_key = %key.week_key,
            mission_id = %key.mission_id,
            count,
            "Claim retracted"
        );
        Ok(RetractOutcome { removed: true })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use tokio_test::assert_ok;

    const WEEK: &str = "2024-01-01";

    fn service() -> (Arc<MemoryStore>, AccomplishService) {
        let store = Arc::new(MemoryStore::new());
        let service = AccomplishService::new(&Stores::new(Arc::clone(&store)));
        (store, service)
    }

    async fn total(store: &MemoryStore, mission: &str) -> i64 {
        let sums = store
            .sum_by_mission_ids(WEEK, &[mission.to_string()])
            .await
            .unwrap();
        sums[mission]
    }

    #[test]
    fn test_validate_key_reports_missing_fields() {
        let err = validate_key("", "m1", "").unwrap_err();
        match err {
            BoardError::InvalidArgument(msg) => {
                assert!(msg.contains("weekKey"));
                assert!(msg.contains("clientId"));
                assert!(!msg.contains("missionId"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_ok!(validate_key(WEEK, "m1", "a"));
    }

    #[tokio::test]
    async fn test_invalid_argument_touches_no_storage() {
        let (store, service) = service();
        let result = service.claim(WEEK, "", "a").await;
        assert!(matches!(result, Err(BoardError::InvalidArgument(_))));
        let result = service.retract("", "m1", "a").await;
        assert!(matches!(result, Err(BoardError::InvalidArgument(_))));
        assert_eq!(store.op_count(), 0);
    }

    #[tokio::test]
    async fn test_repeated_claim_counts_once() {
        let (store, service) = service();
        let mut counted = 0;
        for _ in 0..5 {
            if service.claim(WEEK, "m1", "a").await.unwrap().counted {
                counted += 1;
            }
        }
        assert_eq!(counted, 1);
        assert_eq!(total(&store, "m1").await, 1);
    }

    #[tokio::test]
    async fn test_retract_unclaimed_is_noop() {
        let (store, service) = service();
        service.claim(WEEK, "m1", "b").await.unwrap();

        let outcome = service.retract(WEEK, "m1", "a").await.unwrap();
        assert!(!outcome.removed);
        assert_eq!(total(&store, "m1").await, 1);
    }

    #[tokio::test]
    async fn test_retract_claimed_decrements_once() {
        let (store, service) = service();
        service.claim(WEEK, "m1", "a").await.unwrap();
        service.claim(WEEK, "m1", "b").await.unwrap();

        assert!(service.retract(WEEK, "m1", "a").await.unwrap().removed);
        assert!(!service.retract(WEEK, "m1", "a").await.unwrap().removed);
        assert_eq!(total(&store, "m1").await, 1);
    }

    #[tokio::test]
    async fn test_counter_floor_and_prune() {
        let (store, service) = service();
        service.claim(WEEK, "m1", "a").await.unwrap();
        service.retract(WEEK, "m1", "a").await.unwrap();
        service.retract(WEEK, "m1", "a").await.unwrap();

        assert_eq!(store.counter_rows(), 0);
        assert_eq!(total(&store, "m1").await, 0);
    }

    #[tokio::test]
    async fn test_round_trip_reclaim() {
        let (store, service) = service();
        service.claim(WEEK, "m1", "other").await.unwrap();
        let before = total(&store, "m1").await;

        assert!(service.claim(WEEK, "m1", "a").await.unwrap().counted);
        assert!(service.retract(WEEK, "m1", "a").await.unwrap().removed);
        assert!(service.claim(WEEK, "m1", "a").await.unwrap().counted);

        assert_eq!(total(&store, "m1").await, before + 1);
    }

    #[tokio::test]
    async fn test_example_scenario() {
        let (store, service) = service();

        assert!(service.claim(WEEK, "m1", "A").await.unwrap().counted);
        assert_eq!(total(&store, "m1").await, 1);

        assert!(service.claim(WEEK, "m1", "B").await.unwrap().counted);
        assert_eq!(total(&store, "m1").await, 2);

        assert!(!service.claim(WEEK, "m1", "A").await.unwrap().counted);
        assert_eq!(total(&store, "m1").await, 2);

        assert!(service.retract(WEEK, "m1", "A").await.unwrap().removed);
        assert_eq!(total(&store, "m1").await, 1);

        assert!(!service.retract(WEEK, "m1", "A").await.unwrap().removed);
        assert_eq!(total(&store, "m1").await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_claims_distinct_clients() {
        let (store, service) = service();
        let k = 64;

        let handles: Vec<_> = (0..k)
            .map(|i| {
                let service = service.clone();
                tokio::spawn(async move {
                    service.claim(WEEK, "m1", &format!("client-{i}")).await
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.await.unwrap().unwrap().counted);
        }

        assert_eq!(total(&store, "m1").await, k);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_claims_same_client() {
        let (store, service) = service();

        let handles: Vec<_> = (0..64)
            .map(|_| {
                let service = service.clone();
                tokio::spawn(async move { service.claim(WEEK, "m1", "same").await })
            })
            .collect();

        let mut counted = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap().counted {
                counted += 1;
            }
        }

        assert_eq!(counted, 1);
        assert_eq!(total(&store, "m1").await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_interleaved_clients_keep_invariant() {
        let (store, service) = service();

        let handles: Vec<_> = (0..16)
            .map(|c| {
                let service = service.clone();
                tokio::spawn(async move {
                    let client = format!("c{c}");
                    for step in 0..(c + 3) {
                        if step % 2 == 0 {
                            service.claim(WEEK, "m1", &client).await?;
                        } else {
                            service.retract(WEEK, "m1", &client).await?;
                        }
                    }
                    Ok::<_, BoardError>(())
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let live = store.tally(WEEK).await.unwrap().get("m1").copied().unwrap_or(0);
        assert_eq!(total(&store, "m1").await, live);
        // c + 3 steps end claimed when c is even
        assert_eq!(live, 8);
    }

    #[tokio::test]
    async fn test_storage_error_propagates() {
        let (store, service) = service();
        store.set_available(false);

        let result = service.claim(WEEK, "m1", "a").await;
        assert!(matches!(result, Err(BoardError::Storage(_))));

        store.set_available(true);
        // Retry after the outage succeeds and counts once
        assert!(service.claim(WEEK, "m1", "a").await.unwrap().counted);
        assert_eq!(total(&store, "m1").await, 1);
    }

    #[tokio::test]
    async fn test_failed_increment_leaves_counter_lagging() {
        let (store, service) = service();
        store.set_counter_writes_failing(true);

        let result = service.claim(WEEK, "m1", "a").await;
        match result {
            Err(BoardError::Storage(msg)) => assert_eq!(msg, "counter write failed"),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(store.event_count(), 1);
        assert_eq!(total(&store, "m1").await, 0);

        // The event already exists, so the retry does not count again
        store.set_counter_writes_failing(false);
        assert!(!service.claim(WEEK, "m1", "a").await.unwrap().counted);
        assert_eq!(total(&store, "m1").await, 0);

        let report = crate::services::ReconcileService::new(&Stores::new(Arc::clone(&store)))
            .reconcile(WEEK)
            .await
            .unwrap();
        assert_eq!(report.corrected.len(), 1);
        assert_eq!(total(&store, "m1").await, 1);
    }

    #[tokio::test]
    async fn test_failed_decrement_leaves_counter_stale() {
        let (store, service) = service();
        service.claim(WEEK, "m1", "a").await.unwrap();
        store.set_counter_writes_failing(true);

        let result = service.retract(WEEK, "m1", "a").await;
        assert!(matches!(result, Err(BoardError::Storage(_))));
        assert_eq!(store.event_count(), 0);
        assert_eq!(total(&store, "m1").await, 1);

        store.set_counter_writes_failing(false);
        assert!(!service.retract(WEEK, "m1", "a").await.unwrap().removed);

        crate::services::ReconcileService::new(&Stores::new(Arc::clone(&store)))
            .reconcile(WEEK)
            .await
            .unwrap();
        assert_eq!(total(&store, "m1").await, 0);
        assert_eq!(store.counter_rows(), 0);
    }
}
