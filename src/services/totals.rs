//! Totals query service - per-mission counts for display
//!
//! Read-only. Missing counters read as 0 and an empty request never reaches
//! storage (the board asks before it knows its mission ids).

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::debug;

use crate::store::{CounterStore, Stores};
use crate::types::Result;

/// Reads aggregate counts from the counter store
#[derive(Clone)]
pub struct TotalsService {
    counters: Arc<dyn CounterStore>,
}

impl TotalsService {
    pub fn new(stores: &Stores) -> Self {
        Self {
            counters: Arc::clone(&stores.counters),
        }
    }

    /// Count of accomplishing clients per requested mission for one week.
    ///
    /// Every requested id appears in the result; unknown ids map to 0.
    pub async fn get_totals(
        &self,
        week_key: &str,
        mission_ids: &[String],
    ) -> Result<BTreeMap<String, i64>> {
        let ids = normalize_ids(mission_ids);
        if ids.is_empty() {
            return Ok(BTreeMap::new());
        }

        let sums = self.counters.sum_by_mission_ids(week_key, &ids).await?;
        debug!(week_key = %week_key, requested = ids.len(), "Totals fetched");

        Ok(ids
            .into_iter()
            .map(|id| {
                let count = sums.get(&id).copied().unwrap_or(0).max(0);
                (id, count)
            })
            .collect())
    }
}

/// Trim, drop empties, and deduplicate while keeping first-seen order
pub fn normalize_ids(mission_ids: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    mission_ids
        .iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty())
        .filter(|id| seen.insert(id.to_string()))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::AccomplishService;
    use crate::store::MemoryStore;

    const WEEK: &str = "2024-01-01";

    fn ids(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_normalize_ids() {
        assert_eq!(
            normalize_ids(&ids(&[" m2", "m1", "", "m2 ", "  "])),
            ids(&["m2", "m1"])
        );
    }

    #[tokio::test]
    async fn test_empty_request_skips_storage() {
        let store = Arc::new(MemoryStore::new());
        let totals = TotalsService::new(&Stores::new(Arc::clone(&store)));

        assert!(totals.get_totals(WEEK, &[]).await.unwrap().is_empty());
        assert!(totals.get_totals(WEEK, &ids(&["", " "])).await.unwrap().is_empty());
        assert_eq!(store.op_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_ids_are_zero() {
        let store = Arc::new(MemoryStore::new());
        let totals = TotalsService::new(&Stores::new(store));

        let result = totals.get_totals(WEEK, &ids(&["missing-id"])).await.unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result["missing-id"], 0);
    }

    #[tokio::test]
    async fn test_totals_reflect_claims_for_week() {
        let store = Arc::new(MemoryStore::new());
        let stores = Stores::new(store);
        let accomplish = AccomplishService::new(&stores);
        let totals = TotalsService::new(&stores);

        accomplish.claim(WEEK, "m1", "a").await.unwrap();
        accomplish.claim(WEEK, "m1", "b").await.unwrap();
        accomplish.claim(WEEK, "m2", "a").await.unwrap();
        accomplish.claim("2024-01-08", "m1", "a").await.unwrap();

        let result = totals
            .get_totals(WEEK, &ids(&["m1", "m2", "m3", "m1"]))
            .await
            .unwrap();
        assert_eq!(result.len(), 3);
        assert_eq!(result["m1"], 2);
        assert_eq!(result["m2"], 1);
        assert_eq!(result["m3"], 0);
    }
}
