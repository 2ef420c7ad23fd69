//! Missionboard - weekly missions gateway
//!
//! Three missions per calendar week; visitors mark them accomplished and the
//! board shows how many people accomplished each one this week.
//!
//! ## Components
//!
//! - **Event store**: one record per (week, mission, client) claim
//! - **Counter store**: derived per-(week, mission) count of distinct clients
//! - **Accomplish service**: idempotent claim/retract over both stores
//! - **Totals service**: read-only counts for a batch of missions
//! - **Reconcile service**: rewrites counters that drifted from the events

pub mod config;
pub mod db;
pub mod routes;
pub mod server;
pub mod services;
pub mod store;
pub mod types;
pub mod week;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{BoardError, Result};
