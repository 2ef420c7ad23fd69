//! Database layer for Missionboard
//!
//! MongoDB documents for accomplishment events and weekly mission counters.

pub mod mongo;
pub mod schemas;

pub use mongo::{is_duplicate_key, IntoIndexes, MongoClient};
pub use schemas::{AccomplishEventDoc, MissionCounterDoc, COUNTER_COLLECTION, EVENT_COLLECTION};
