//! Reconcile service - repairs counter drift
//!
//! Claim and retract write the event and the counter separately. A failure
//! between the two writes leaves the counter off by one until this pass
//! rewrites it from the live event tally.
//!
//! The counters are read on both sides of the tally. A mission whose counter
//! moved in between is left for the next pass, and each repair is a
//! compare-and-set against the value that was read, so a pass never
//! overwrites a counter that a concurrent claim or retract just updated.

use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::store::{CounterKey, CounterStore, EventStore, Stores};
use crate::types::Result;
use crate::week;

/// One counter that disagreed with the event tally
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Drift {
    pub mission_id: String,
    /// Value the counter held before the repair
    pub counter: i64,
    /// Live events, now written to the counter
    pub events: i64,
}

/// Summary of one reconcile pass
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub week_key: String,
    pub checked: usize,
    pub corrected: Vec<Drift>,
    /// Missions whose counter moved during the pass
    pub skipped: usize,
}

#[derive(Clone)]
pub struct ReconcileService {
    events: Arc<dyn EventStore>,
    counters: Arc<dyn CounterStore>,
}

impl ReconcileService {
    pub fn new(stores: &Stores) -> Self {
        Self {
            events: Arc::clone(&stores.events),
            counters: Arc::clone(&stores.counters),
        }
    }

    /// Rewrite every counter of a week that disagrees with its event tally
    pub async fn reconcile(&self, week_key: &str) -> Result<ReconcileReport> {
        let before = self.counters.week_counts(week_key).await?;
        let tally = self.events.tally(week_key).await?;
        let after = self.counters.week_counts(week_key).await?;

        let missions: BTreeSet<&String> = tally
            .keys()
            .chain(before.keys())
            .chain(after.keys())
            .collect();
        let mut corrected = Vec::new();
        let mut skipped = 0;

        for mission_id in &missions {
            let seen = after.get(*mission_id).copied();
            if before.get(*mission_id).copied() != seen {
                debug!(week_key = %week_key, mission_id = %mission_id, "Counter moved during pass");
                skipped += 1;
                continue;
            }

            let events = tally.get(*mission_id).copied().unwrap_or(0);
            let counter = seen.unwrap_or(0);
            if events == counter {
                continue;
            }

            warn!(
                week_key = %week_key,
                mission_id = %mission_id,
                counter,
                events,
                "Counter drift detected"
            );
            let key = CounterKey::new(week_key, mission_id.as_str());
            if !self.counters.set_count(&key, seen, events).await? {
                debug!(week_key = %week_key, mission_id = %mission_id, "Counter moved before repair");
                skipped += 1;
                continue;
            }
            corrected.push(Drift {
                mission_id: mission_id.to_string(),
                counter,
                events,
            });
        }

        info!(
            week_key = %week_key,
            checked = missions.len(),
            corrected = corrected.len(),
            skipped,
            "Reconcile pass complete"
        );

        Ok(ReconcileReport {
            week_key: week_key.to_string(),
            checked: missions.len(),
            corrected,
            skipped,
        })
    }
}

/// Spawn a background task reconciling the current week on an interval
pub fn spawn_reconcile_task(
    service: ReconcileService,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval_timer = tokio::time::interval(interval);
        loop {
            interval_timer.tick().await;
            let week_key = week::current_week_key();
            if let Err(e) = service.reconcile(&week_key).await {
                error!(week_key = %week_key, error = %e, "Reconcile pass failed");
            }
        }
    })
}
