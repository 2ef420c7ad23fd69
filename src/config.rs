//! Configuration for Missionboard
//!
//! CLI arguments and environment variable handling using clap.

use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use uuid::Uuid;

/// Which persistence backend holds events and counters
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// MongoDB (durable, shared between instances)
    Mongo,
    /// Process-local maps (dev and tests only)
    Memory,
}

/// Missionboard - weekly missions gateway
#[derive(Parser, Debug, Clone)]
#[command(name = "missionboard")]
#[command(about = "Weekly missions API with idempotent accomplishment counting")]
pub struct Args {
    /// Unique node identifier for this instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Persistence backend
    #[arg(long, env = "STORE", value_enum, default_value = "mongo")]
    pub store: StoreKind,

    /// MongoDB connection configuration
    #[command(flatten)]
    pub mongo: MongoArgs,

    /// Enable development mode (falls back to the memory store if MongoDB is unreachable)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format: "text" or "json"
    #[arg(long, env = "LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Key required in X-Admin-Key for admin routes (admin routes disabled when unset)
    #[arg(long, env = "ADMIN_KEY")]
    pub admin_key: Option<String>,

    /// Reconcile the current week's counters every N seconds (disabled when unset)
    #[arg(long, env = "RECONCILE_INTERVAL_SECS")]
    pub reconcile_interval_secs: Option<u64>,

    /// Comma-separated mission catalog used by GET /week
    #[arg(long, env = "MISSION_IDS")]
    pub mission_ids: Option<String>,

    /// Number of missions selected per week
    #[arg(long, env = "MISSIONS_PER_WEEK", default_value = "3")]
    pub missions_per_week: usize,
}

/// MongoDB connection configuration
#[derive(Parser, Debug, Clone)]
pub struct MongoArgs {
    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "missionboard")]
    pub mongodb_db: String,

    /// Connection pool ceiling
    #[arg(long, env = "MONGODB_MAX_POOL_SIZE", default_value = "10")]
    pub max_pool_size: u32,

    /// How long to wait for a usable server before failing an operation
    #[arg(long, env = "MONGODB_SERVER_SELECTION_TIMEOUT_MS", default_value = "10000")]
    pub server_selection_timeout_ms: u64,
}

impl Args {
    /// Get the mission catalog, in configured order
    pub fn mission_catalog(&self) -> Vec<String> {
        match self.mission_ids {
            Some(ref ids) => ids
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Whether JSON log output was requested
    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.missions_per_week == 0 {
            return Err("MISSIONS_PER_WEEK must be at least 1".to_string());
        }

        if self.reconcile_interval_secs == Some(0) {
            return Err("RECONCILE_INTERVAL_SECS must be greater than 0".to_string());
        }

        if self.store == StoreKind::Mongo && self.mongo.mongodb_db.trim().is_empty() {
            return Err("MONGODB_DB must not be empty".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["missionboard"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn test_defaults_are_valid() {
        let args = parse(&["--store", "memory"]);
        assert_eq!(args.store, StoreKind::Memory);
        assert_eq!(args.missions_per_week, 3);
        assert!(args.validate().is_ok());
        assert!(args.mission_catalog().is_empty());
    }

    #[test]
    fn test_mission_catalog_parsing() {
        let args = parse(&["--mission-ids", " a, b ,,c "]);
        assert_eq!(args.mission_catalog(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let args = parse(&["--reconcile-interval-secs", "0"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_missions() {
        let args = parse(&["--missions-per-week", "0"]);
        assert!(args.validate().is_err());
    }
}
