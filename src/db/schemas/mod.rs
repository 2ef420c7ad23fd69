//! Database schemas for Missionboard

mod accomplish_event;
mod mission_counter;

pub use accomplish_event::{AccomplishEventDoc, EVENT_COLLECTION};
pub use mission_counter::{MissionCounterDoc, COUNTER_COLLECTION};
