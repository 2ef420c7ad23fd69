//! MongoDB storage backend
//!
//! Every contract operation maps onto one single-document atomic primitive:
//! - try_insert: upsert with `$setOnInsert` (inserted iff an id was upserted)
//! - remove: `deleteOne` (removed iff one document was deleted)
//! - increment / decrement: `findOneAndUpdate` with `$inc`
//!
//! The unique indexes on both collections back these up at the storage level.

use async_trait::async_trait;
use bson::{doc, Bson, Document};
use futures_util::TryStreamExt;
use mongodb::options::ReturnDocument;
use mongodb::Collection;
use std::collections::HashMap;
use tracing::{debug, warn};

use super::{CounterKey, CounterStore, EventKey, EventStore, StorageBackend};
use crate::db::{
    is_duplicate_key, AccomplishEventDoc, MissionCounterDoc, MongoClient, COUNTER_COLLECTION,
    EVENT_COLLECTION,
};
use crate::types::{BoardError, Result};

/// MongoDB-backed event and counter stores
pub struct MongoStore {
    client: MongoClient,
    events: Collection<AccomplishEventDoc>,
    counters: Collection<MissionCounterDoc>,
}

impl MongoStore {
    /// Open both collections, ensuring their unique indexes exist
    pub async fn open(client: MongoClient) -> Result<Self> {
        let events = client.collection::<AccomplishEventDoc>(EVENT_COLLECTION).await?;
        let counters = client.collection::<MissionCounterDoc>(COUNTER_COLLECTION).await?;
        Ok(Self {
            client,
            events,
            counters,
        })
    }

    /// Run a `$group` pipeline and read `{_id: missionId, total}` rows
    async fn grouped_totals<T>(
        collection: &Collection<T>,
        pipeline: Vec<Document>,
    ) -> Result<Vec<(String, i64)>>
    where
        T: Send + Sync,
    {
        let rows: Vec<Document> = collection.aggregate(pipeline).await?.try_collect().await?;

        Ok(rows
            .iter()
            .filter_map(|row| {
                let mission_id = row.get_str("_id").ok()?;
                Some((mission_id.to_string(), read_number(row.get("total"))))
            })
            .collect())
    }
}

/// Numeric aggregate output may come back as any BSON number type
fn read_number(value: Option<&Bson>) -> i64 {
    match value {
        Some(Bson::Int32(n)) => i64::from(*n),
        Some(Bson::Int64(n)) => *n,
        Some(Bson::Double(f)) => *f as i64,
        _ => 0,
    }
}

#[async_trait]
impl EventStore for MongoStore {
    async fn try_insert(&self, key: &EventKey) -> Result<bool> {
        let result = self
            .events
            .update_one(AccomplishEventDoc::filter(key), AccomplishEventDoc::on_insert(key))
            .upsert(true)
            .await;

        match result {
            Ok(outcome) => Ok(outcome.upserted_id.is_some()),
            // A concurrent upsert of the same triple won
            Err(e) if is_duplicate_key(&e) => {
                debug!(week_key = %key.week_key, mission_id = %key.mission_id, "Event upsert lost race");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn remove(&self, key: &EventKey) -> Result<bool> {
        let outcome = self.events.delete_one(AccomplishEventDoc::filter(key)).await?;
        Ok(outcome.deleted_count == 1)
    }

    async fn tally(&self, week_key: &str) -> Result<HashMap<String, i64>> {
        let pipeline = vec![
            doc! { "$match": { "weekKey": week_key } },
            doc! { "$group": { "_id": "$missionId", "total": { "$sum": 1 } } },
        ];
        Ok(Self::grouped_totals(&self.events, pipeline)
            .await?
            .into_iter()
            .collect())
    }
}

#[async_trait]
impl CounterStore for MongoStore {
    async fn increment(&self, key: &CounterKey) -> Result<i64> {
        let mut retried = false;
        loop {
            let result = self
                .counters
                .find_one_and_update(MissionCounterDoc::filter(key), doc! { "$inc": { "count": 1 } })
                .upsert(true)
                .return_document(ReturnDocument::After)
                .await;

            match result {
                Ok(Some(counter)) => return Ok(counter.count),
                Ok(None) => {
                    return Err(BoardError::Storage(
                        "counter upsert returned no document".into(),
                    ))
                }
                // Two first-increments raced to create the row; the row exists now
                Err(e) if !retried && is_duplicate_key(&e) => {
                    debug!(week_key = %key.week_key, mission_id = %key.mission_id, "Retrying counter upsert");
                    retried = true;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn decrement_and_prune(&self, key: &CounterKey) -> Result<i64> {
        let updated = self
            .counters
            .find_one_and_update(MissionCounterDoc::filter(key), doc! { "$inc": { "count": -1 } })
            .return_document(ReturnDocument::After)
            .await?;

        let next = match updated {
            Some(counter) => counter.count,
            None => {
                warn!(
                    week_key = %key.week_key,
                    mission_id = %key.mission_id,
                    "Decrement on missing counter (counter drift)"
                );
                return Ok(0);
            }
        };

        if next <= 0 {
            // Only delete while still exhausted so a racing increment survives
            self.counters
                .delete_one(MissionCounterDoc::exhausted_filter(key))
                .await?;
            return Ok(0);
        }

        Ok(next)
    }

    async fn sum_by_mission_ids(
        &self,
        week_key: &str,
        mission_ids: &[String],
    ) -> Result<HashMap<String, i64>> {
        let mut totals: HashMap<String, i64> =
            mission_ids.iter().map(|id| (id.clone(), 0)).collect();

        if mission_ids.is_empty() {
            return Ok(totals);
        }

        let pipeline = vec![
            doc! { "$match": { "weekKey": week_key, "missionId": { "$in": mission_ids.to_vec() } } },
            doc! { "$group": { "_id": "$missionId", "total": { "$sum": "$count" } } },
        ];

        for (mission_id, total) in Self::grouped_totals(&self.counters, pipeline).await? {
            totals.insert(mission_id, total.max(0));
        }

        Ok(totals)
    }

    async fn week_counts(&self, week_key: &str) -> Result<HashMap<String, i64>> {
        let rows: Vec<MissionCounterDoc> = self
            .counters
            .find(doc! { "weekKey": week_key })
            .await?
            .try_collect()
            .await?;

        Ok(rows.into_iter().map(|c| (c.mission_id, c.count)).collect())
    }

    async fn set_count(
        &self,
        key: &CounterKey,
        expected: Option<i64>,
        count: i64,
    ) -> Result<bool> {
        match expected {
            Some(seen) if count <= 0 => {
                let outcome = self
                    .counters
                    .delete_one(MissionCounterDoc::holding_filter(key, seen))
                    .await?;
                Ok(outcome.deleted_count == 1)
            }
            Some(seen) => {
                let outcome = self
                    .counters
                    .update_one(
                        MissionCounterDoc::holding_filter(key, seen),
                        doc! { "$set": { "count": count } },
                    )
                    .await?;
                Ok(outcome.matched_count == 1)
            }
            None if count <= 0 => Ok(true),
            None => {
                // Creates the row only if nobody else has since
                let result = self
                    .counters
                    .update_one(
                        MissionCounterDoc::filter(key),
                        doc! { "$setOnInsert": { "count": count } },
                    )
                    .upsert(true)
                    .await;

                match result {
                    Ok(outcome) => Ok(outcome.upserted_id.is_some()),
                    Err(e) if is_duplicate_key(&e) => Ok(false),
                    Err(e) => Err(e.into()),
                }
            }
        }
    }
}

#[async_trait]
impl StorageBackend for MongoStore {
    fn name(&self) -> &'static str {
        "mongo"
    }

    async fn ping(&self) -> Result<()> {
        self.client.ping().await
    }
}
