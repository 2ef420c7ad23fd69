//! HTTP routes for Missionboard

pub mod accomplish;
pub mod admin;
pub mod health;
pub mod response;
pub mod totals;
pub mod week;

pub use accomplish::{handle_claim, handle_retract};
pub use admin::{handle_reconcile, ADMIN_KEY_HEADER};
pub use health::health_check;
pub use response::{error_response, json_response};
pub use totals::handle_mission_totals;
pub use week::current_week;
