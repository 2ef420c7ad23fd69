//! MongoDB client and collection wrapper
//!
//! One `MongoClient` is created by the composition root at startup. Indexes
//! are applied once when a typed collection is opened, not on every request.

use bson::{doc, Document};
use mongodb::{
    error::{ErrorKind, WriteFailure},
    options::{ClientOptions, IndexOptions},
    Client, Collection, IndexModel,
};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::MongoArgs;
use crate::types::BoardError;

/// MongoDB server error code for a unique index violation
const DUPLICATE_KEY: i32 = 11000;

/// Trait for schemas that provide index definitions
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

/// MongoDB client wrapper
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Connect and verify the server answers a ping
    pub async fn connect(args: &MongoArgs) -> Result<Self, BoardError> {
        info!("Connecting to MongoDB at {}", redact_uri(&args.mongodb_uri));

        let mut options = ClientOptions::parse(&args.mongodb_uri)
            .await
            .map_err(|e| BoardError::Config(format!("Invalid MONGODB_URI: {}", e)))?;
        options.max_pool_size = Some(args.max_pool_size);
        options.server_selection_timeout =
            Some(Duration::from_millis(args.server_selection_timeout_ms));
        options.app_name = Some("missionboard".to_string());

        let client = Client::with_options(options)
            .map_err(|e| BoardError::Storage(format!("Failed to connect to MongoDB: {}", e)))?;

        let mongo = Self {
            client,
            db_name: args.mongodb_db.clone(),
        };
        mongo.ping().await?;

        info!("Connected to MongoDB database '{}'", mongo.db_name);
        Ok(mongo)
    }

    /// Lightweight liveness round-trip
    pub async fn ping(&self) -> Result<(), BoardError> {
        self.client
            .database(&self.db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| BoardError::Storage(format!("MongoDB ping failed: {}", e)))?;
        Ok(())
    }

    /// Open a typed collection and apply its indexes
    pub async fn collection<T>(&self, name: &str) -> Result<Collection<T>, BoardError>
    where
        T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes,
    {
        let collection = self.client.database(&self.db_name).collection::<T>(name);
        apply_indexes(&collection).await?;
        Ok(collection)
    }

}

/// Apply schema-defined indexes
async fn apply_indexes<T>(collection: &Collection<T>) -> Result<(), BoardError>
where
    T: Send + Sync + IntoIndexes,
{
    let indices: Vec<IndexModel> = T::into_indices()
        .into_iter()
        .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
        .collect();

    if indices.is_empty() {
        return Ok(());
    }

    debug!(
        collection = %collection.name(),
        count = indices.len(),
        "Ensuring indexes"
    );

    collection
        .create_indexes(indices)
        .await
        .map_err(|e| BoardError::Storage(format!("Failed to create indexes: {}", e)))?;

    Ok(())
}

/// Whether an error is a unique index violation.
///
/// Concurrent upserts on the same key can race past the server's own retry;
/// the loser sees E11000.
pub fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY,
        ErrorKind::Command(e) => e.code == DUPLICATE_KEY,
        _ => false,
    }
}

/// Strip credentials from a connection string before logging it
fn redact_uri(uri: &str) -> String {
    match (uri.find("://"), uri.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***@{}", &uri[..scheme_end], &uri[at + 1..])
        }
        _ => uri.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_uri() {
        assert_eq!(
            redact_uri("mongodb://user:pw@db.local:27017/x"),
            "mongodb://***@db.local:27017/x"
        );
        assert_eq!(
            redact_uri("mongodb://localhost:27017"),
            "mongodb://localhost:27017"
        );
    }

    fn write_error(code: i32) -> mongodb::error::Error {
        let err: mongodb::error::WriteError = mongodb::bson::from_document(
            mongodb::bson::doc! { "code": code, "errmsg": "write failed" },
        )
        .unwrap();
        ErrorKind::Write(WriteFailure::WriteError(err)).into()
    }

    fn command_error(code: i32) -> mongodb::error::Error {
        let err: mongodb::error::CommandError = mongodb::bson::from_document(
            mongodb::bson::doc! { "code": code, "codeName": "Failed", "errmsg": "command failed" },
        )
        .unwrap();
        ErrorKind::Command(err).into()
    }

    #[test]
    fn test_duplicate_key_detection() {
        assert!(is_duplicate_key(&write_error(DUPLICATE_KEY)));
        assert!(is_duplicate_key(&command_error(DUPLICATE_KEY)));

        assert!(!is_duplicate_key(&write_error(121)));
        assert!(!is_duplicate_key(&command_error(112)));
    }

    #[test]
    fn test_duplicate_key_maps_to_storage_error_when_surfaced() {
        let err: BoardError = write_error(DUPLICATE_KEY).into();
        assert!(matches!(err, BoardError::Storage(_)));
    }
}
