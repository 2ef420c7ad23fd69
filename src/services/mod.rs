//! Services for Missionboard
//!
//! - **Accomplish**: idempotent claim/retract across the event and counter stores
//! - **Totals**: read-only per-mission counts
//! - **Reconcile**: repairs counter drift from the event log

pub mod accomplish;
pub mod reconcile;
pub mod totals;

pub use accomplish::{AccomplishService, ClaimOutcome, RetractOutcome};
pub use reconcile::{spawn_reconcile_task, Drift, ReconcileReport, ReconcileService};
pub use totals::TotalsService;
