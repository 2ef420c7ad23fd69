//! Missionboard - weekly missions gateway

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use missionboard::{
    config::{Args, StoreKind},
    db::MongoClient,
    server,
    store::{MemoryStore, MongoStore, Stores},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    init_tracing(&args);

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Missionboard");
    info!("======================================");
    info!("Node ID: {}", args.node_id);
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("Store: {:?}", args.store);
    info!("Missions in catalog: {}", args.mission_catalog().len());
    info!("======================================");

    let stores = match open_stores(&args).await {
        Ok(stores) => stores,
        Err(e) => {
            error!("Storage initialization failed: {}", e);
            std::process::exit(1);
        }
    };

    let state = Arc::new(server::AppState::new(args, stores));
    server::run(state).await?;

    Ok(())
}

fn init_tracing(args: &Args) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("missionboard={},info", args.log_level).into());

    if args.json_logs() {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Build the storage handles once; every service shares them
async fn open_stores(args: &Args) -> missionboard::Result<Stores> {
    match args.store {
        StoreKind::Memory => {
            warn!("Using in-memory store - counts are lost on restart");
            Ok(Stores::new(Arc::new(MemoryStore::new())))
        }
        StoreKind::Mongo => {
            let connected = match MongoClient::connect(&args.mongo).await {
                Ok(client) => MongoStore::open(client).await,
                Err(e) => Err(e),
            };

            match connected {
                Ok(store) => {
                    info!("MongoDB store ready");
                    Ok(Stores::new(Arc::new(store)))
                }
                Err(e) if args.dev_mode => {
                    warn!("MongoDB unavailable (dev mode, continuing in memory): {}", e);
                    Ok(Stores::new(Arc::new(MemoryStore::new())))
                }
                Err(e) => Err(e),
            }
        }
    }
}
