//! MongoDB document backend.
//!
//! This module requires the `mongodb` feature flag (enabled by default).
//!
//! Records live in one collection (default `session`) of the database named
//! in the connection string:
//!
//! ```text
//! { session_key: String, session_data: BinData | null, session_expire: Int64 }
//! ```
//!
//! [`MongoBackend::connect`] pings the server and ensures a unique index on
//! `session_key` plus an index on `session_expire` for the GC sweep.

use crate::backend::{DocumentBackend, SessionRecord};
use crate::config::ProviderConfig;
use crate::error::{SessionError, SessionResult};
use async_trait::async_trait;
use mongodb::bson::spec::BinarySubtype;
use mongodb::bson::{Binary, Bson, Document, doc};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{ClientOptions, IndexOptions, ReturnDocument};
use mongodb::{Client, Collection, IndexModel};
use tracing::{debug, info};

/// Database used when the connection string names none.
pub const DEFAULT_DATABASE: &str = "test";

const DUPLICATE_KEY: i32 = 11000;

/// MongoDB-backed record collection.
///
/// The driver keeps its own connection pool; each command checks a
/// connection out and returns it when the command completes.
///
/// # Examples
///
/// ```no_run
/// use armature_docstore_session::{DocumentBackend, MongoBackend, ProviderConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ProviderConfig::mongodb("mongodb://localhost:27017/app")?;
/// let backend = MongoBackend::connect(&config.url, &config).await?;
/// println!("{} sessions", backend.count().await?);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MongoBackend {
    collection: Collection<Document>,
}

impl MongoBackend {
    /// Wrap an existing collection handle without checking the server.
    pub fn from_collection(collection: Collection<Document>) -> Self {
        Self { collection }
    }

    async fn ensure_indexes(&self) -> SessionResult<()> {
        let unique_key = IndexModel::builder()
            .keys(doc! { "session_key": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        let expire = IndexModel::builder()
            .keys(doc! { "session_expire": 1 })
            .build();

        self.collection
            .create_indexes([unique_key, expire])
            .await
            .map_err(|e| SessionError::Connection(e.to_string()))?;
        Ok(())
    }

    async fn upsert_default(
        &self,
        key: &str,
        expire: i64,
    ) -> mongodb::error::Result<Option<Document>> {
        self.collection
            .find_one_and_update(
                doc! { "session_key": key },
                doc! {
                    "$setOnInsert": {
                        "session_data": Bson::Null,
                        "session_expire": expire,
                    }
                },
            )
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await
    }
}

#[async_trait]
impl DocumentBackend for MongoBackend {
    async fn connect(target: &str, config: &ProviderConfig) -> SessionResult<Self> {
        let options = ClientOptions::parse(target)
            .await
            .map_err(|e| SessionError::Connection(e.to_string()))?;
        let client =
            Client::with_options(options).map_err(|e| SessionError::Connection(e.to_string()))?;

        let database = client
            .default_database()
            .unwrap_or_else(|| client.database(DEFAULT_DATABASE));

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| SessionError::Connection(e.to_string()))?;

        let backend = Self {
            collection: database.collection(&config.collection),
        };
        backend.ensure_indexes().await?;

        info!(
            database = %database.name(),
            collection = %config.collection,
            "MongoDB session backend connected"
        );

        Ok(backend)
    }

    async fn find_or_insert(&self, key: &str, expire: i64) -> SessionResult<SessionRecord> {
        // Two concurrent upserts of a new key can race to the insert; the
        // unique index rejects the loser, whose retry then finds the winner.
        let document = match self.upsert_default(key, expire).await {
            Err(e) if is_duplicate_key(&e) => {
                debug!(session_key = key, "Retrying session upsert after duplicate key");
                self.upsert_default(key, expire).await?
            }
            result => result?,
        };

        let document = document.ok_or_else(|| {
            SessionError::Backend(format!("upsert returned no record for {}", key))
        })?;
        record_from_document(&document)
    }

    async fn rename_or_insert(
        &self,
        old_key: &str,
        new_key: &str,
        expire: i64,
    ) -> SessionResult<SessionRecord> {
        let document = self
            .collection
            .find_one_and_update(
                doc! { "session_key": old_key },
                doc! {
                    "$set": {
                        "session_key": new_key,
                        "session_expire": expire,
                    },
                    "$setOnInsert": {
                        "session_data": Bson::Null,
                    }
                },
            )
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    SessionError::Backend(format!("duplicate session key: {}", new_key))
                } else {
                    SessionError::from(e)
                }
            })?
            .ok_or_else(|| {
                SessionError::Backend(format!("upsert returned no record for {}", new_key))
            })?;

        record_from_document(&document)
    }

    async fn find(&self, key: &str) -> SessionResult<Option<SessionRecord>> {
        let document = self
            .collection
            .find_one(doc! { "session_key": key })
            .await?;
        document.as_ref().map(record_from_document).transpose()
    }

    async fn update_data(&self, key: &str, data: Vec<u8>) -> SessionResult<bool> {
        let blob = Binary {
            subtype: BinarySubtype::Generic,
            bytes: data,
        };
        let result = self
            .collection
            .update_one(
                doc! { "session_key": key },
                doc! { "$set": { "session_data": blob } },
            )
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn delete(&self, key: &str) -> SessionResult<()> {
        self.collection
            .delete_one(doc! { "session_key": key })
            .await?;
        Ok(())
    }

    async fn delete_expired(&self, now: i64) -> SessionResult<u64> {
        let result = self
            .collection
            .delete_many(doc! { "session_expire": { "$lt": now } })
            .await?;
        Ok(result.deleted_count)
    }

    async fn count(&self) -> SessionResult<u64> {
        Ok(self.collection.count_documents(doc! {}).await?)
    }

    fn name(&self) -> &'static str {
        "mongodb"
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Command(command) => command.code == DUPLICATE_KEY,
        ErrorKind::Write(WriteFailure::WriteError(write)) => write.code == DUPLICATE_KEY,
        _ => false,
    }
}

/// Convert a stored document into a record.
pub(crate) fn record_from_document(document: &Document) -> SessionResult<SessionRecord> {
    let session_key = document
        .get_str("session_key")
        .map_err(|e| SessionError::Decode(format!("session_key: {}", e)))?
        .to_string();

    let session_data = match document.get("session_data") {
        None | Some(Bson::Null) => None,
        Some(Bson::Binary(binary)) => Some(binary.bytes.clone()),
        Some(other) => {
            return Err(SessionError::Decode(format!(
                "session_data has unexpected type {:?}",
                other.element_type()
            )));
        }
    };

    let session_expire = match document.get("session_expire") {
        Some(Bson::Int64(expire)) => *expire,
        Some(Bson::Int32(expire)) => i64::from(*expire),
        Some(Bson::Double(expire)) => *expire as i64,
        other => {
            return Err(SessionError::Decode(format!(
                "session_expire missing or not a number: {:?}",
                other
            )));
        }
    };

    Ok(SessionRecord {
        session_key,
        session_data,
        session_expire,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_from_fresh_document() {
        let document = doc! {
            "session_key": "abc",
            "session_data": Bson::Null,
            "session_expire": 1_700_000_000_i64,
        };
        let record = record_from_document(&document).unwrap();
        assert_eq!(record, SessionRecord::new("abc", 1_700_000_000));
    }

    #[test]
    fn test_record_from_document_with_data() {
        let blob = Binary {
            subtype: BinarySubtype::Generic,
            bytes: b"{}".to_vec(),
        };
        let document = doc! {
            "session_key": "abc",
            "session_data": blob,
            "session_expire": 5_i32,
        };
        let record = record_from_document(&document).unwrap();
        assert_eq!(record.session_data.as_deref(), Some(&b"{}"[..]));
        assert_eq!(record.session_expire, 5);
    }

    #[test]
    fn test_record_from_bad_document() {
        let document = doc! {
            "session_key": "abc",
            "session_data": "text",
            "session_expire": 1_i64,
        };
        assert!(matches!(
            record_from_document(&document),
            Err(SessionError::Decode(_))
        ));

        let document = doc! { "session_key": "abc" };
        assert!(matches!(
            record_from_document(&document),
            Err(SessionError::Decode(_))
        ));
    }

    // Requires a running MongoDB: cargo test -- --ignored
    #[tokio::test]
    #[ignore]
    async fn test_connect_and_count() {
        let config = ProviderConfig::mongodb("mongodb://localhost:27017/armature_session_test")
            .unwrap()
            .with_collection("session_unit");
        let backend = MongoBackend::connect(&config.url, &config).await.unwrap();
        backend.find_or_insert("unit-test", i64::MAX).await.unwrap();
        assert!(backend.count().await.unwrap() >= 1);
        backend.delete("unit-test").await.unwrap();
    }
}
