//! Accomplishment event document schema
//!
//! One document per (weekKey, missionId, clientId). Retracted events are
//! deleted outright, so the same triple can be claimed again later.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::IntoIndexes;
use crate::store::EventKey;

/// Collection name for accomplishment events
pub const EVENT_COLLECTION: &str = "accomplish_events";

/// Accomplishment event stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AccomplishEventDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub week_key: String,
    pub mission_id: String,
    pub client_id: String,
    pub created_at: DateTime,
}

impl AccomplishEventDoc {
    /// Exact-match filter for one event
    pub fn filter(key: &EventKey) -> Document {
        doc! {
            "weekKey": key.week_key.as_str(),
            "missionId": key.mission_id.as_str(),
            "clientId": key.client_id.as_str(),
        }
    }

    /// Fields written only when the upsert creates the document
    pub fn on_insert(key: &EventKey) -> Document {
        doc! {
            "$setOnInsert": {
                "weekKey": key.week_key.as_str(),
                "missionId": key.mission_id.as_str(),
                "clientId": key.client_id.as_str(),
                "createdAt": DateTime::now(),
            }
        }
    }
}

impl IntoIndexes for AccomplishEventDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "weekKey": 1, "missionId": 1, "clientId": 1 },
            Some(
                IndexOptions::builder()
                    .unique(true)
                    .name("uniq_week_mission_client".to_string())
                    .build(),
            ),
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_uses_wire_field_names() {
        let key = EventKey::new("2024-01-01", "m1", "client-a");
        let filter = AccomplishEventDoc::filter(&key);
        assert_eq!(filter.get_str("weekKey").unwrap(), "2024-01-01");
        assert_eq!(filter.get_str("missionId").unwrap(), "m1");
        assert_eq!(filter.get_str("clientId").unwrap(), "client-a");
    }

    #[test]
    fn test_unique_index() {
        let indices = AccomplishEventDoc::into_indices();
        assert_eq!(indices.len(), 1);
        let opts = indices[0].1.as_ref().unwrap();
        assert_eq!(opts.unique, Some(true));
    }
}
