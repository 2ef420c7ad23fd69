//! Shared types for Missionboard

pub mod error;

pub use error::{BoardError, Result};
