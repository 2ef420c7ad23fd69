//! Mission counter document schema
//!
//! Number of distinct clients with a live event for one (weekKey, missionId).
//! Rows whose count would drop to zero are deleted, so a missing row means 0.

use bson::{doc, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::IntoIndexes;
use crate::store::CounterKey;

/// Collection name for weekly mission counters
pub const COUNTER_COLLECTION: &str = "accomplish_counts";

/// Weekly mission counter stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct MissionCounterDoc {
    pub week_key: String,
    pub mission_id: String,
    #[serde(default)]
    pub count: i64,
}

impl MissionCounterDoc {
    /// Exact-match filter for one counter
    pub fn filter(key: &CounterKey) -> Document {
        doc! {
            "weekKey": key.week_key.as_str(),
            "missionId": key.mission_id.as_str(),
        }
    }

    /// Filter matching the counter only while it still holds `count`
    pub fn holding_filter(key: &CounterKey, count: i64) -> Document {
        doc! {
            "weekKey": key.week_key.as_str(),
            "missionId": key.mission_id.as_str(),
            "count": count,
        }
    }

    /// Filter matching the counter only while it is exhausted
    pub fn exhausted_filter(key: &CounterKey) -> Document {
        doc! {
            "weekKey": key.week_key.as_str(),
            "missionId": key.mission_id.as_str(),
            "count": { "$lte": 0 },
        }
    }
}

impl IntoIndexes for MissionCounterDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "weekKey": 1, "missionId": 1 },
            Some(
                IndexOptions::builder()
                    .unique(true)
                    .name("uniq_week_mission".to_string())
                    .build(),
            ),
        )]
    }
}
