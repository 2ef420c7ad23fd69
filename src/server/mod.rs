//! HTTP server for Missionboard

pub mod http;

pub use http::{run, AppState};
