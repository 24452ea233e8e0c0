//! In-process document backend.
//!
//! Keeps records in a map behind a single lock, so every operation is
//! atomic. Useful for tests and local development; records do not outlive
//! the process.

use crate::backend::{DocumentBackend, SessionRecord};
use crate::config::ProviderConfig;
use crate::error::{SessionError, SessionResult};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Connection target accepted by [`MemoryBackend::connect`].
pub const MEMORY_URL: &str = "memory://";

/// Memory-backed record collection.
///
/// # Examples
///
/// ```
/// use armature_docstore_session::{DocumentBackend, MemoryBackend};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MemoryBackend::new();
/// let record = backend.find_or_insert("abc", 1_700_000_000).await?;
/// assert_eq!(record.session_key, "abc");
/// assert_eq!(backend.count().await?, 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: RwLock<HashMap<String, SessionRecord>>,
    unavailable: AtomicBool,
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail with a backend error until switched back.
    ///
    /// Simulates an outage of the database.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Copy of the stored record for `key`, bypassing availability.
    pub fn record(&self, key: &str) -> Option<SessionRecord> {
        self.records.read().get(key).cloned()
    }

    fn check(&self) -> SessionResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(SessionError::Backend(
                "memory backend unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentBackend for MemoryBackend {
    async fn connect(target: &str, _config: &ProviderConfig) -> SessionResult<Self> {
        if !target.starts_with(MEMORY_URL) {
            return Err(SessionError::Connection(format!(
                "memory backend target must start with {}, got '{}'",
                MEMORY_URL, target
            )));
        }
        debug!(url = target, "Opened memory session backend");
        Ok(Self::new())
    }

    async fn find_or_insert(&self, key: &str, expire: i64) -> SessionResult<SessionRecord> {
        self.check()?;
        let mut records = self.records.write();
        let record = records
            .entry(key.to_string())
            .or_insert_with(|| SessionRecord::new(key, expire));
        Ok(record.clone())
    }

    async fn rename_or_insert(
        &self,
        old_key: &str,
        new_key: &str,
        expire: i64,
    ) -> SessionResult<SessionRecord> {
        self.check()?;
        let mut records = self.records.write();

        if old_key != new_key && records.contains_key(new_key) {
            return Err(SessionError::Backend(format!(
                "duplicate session key: {}",
                new_key
            )));
        }

        let mut record = records
            .remove(old_key)
            .unwrap_or_else(|| SessionRecord::new(old_key, expire));
        record.session_key = new_key.to_string();
        record.session_expire = expire;
        records.insert(new_key.to_string(), record.clone());

        Ok(record)
    }

    async fn find(&self, key: &str) -> SessionResult<Option<SessionRecord>> {
        self.check()?;
        Ok(self.records.read().get(key).cloned())
    }

    async fn update_data(&self, key: &str, data: Vec<u8>) -> SessionResult<bool> {
        self.check()?;
        match self.records.write().get_mut(key) {
            Some(record) => {
                record.session_data = Some(data);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, key: &str) -> SessionResult<()> {
        self.check()?;
        self.records.write().remove(key);
        Ok(())
    }

    async fn delete_expired(&self, now: i64) -> SessionResult<u64> {
        self.check()?;
        let mut records = self.records.write();
        let before = records.len();
        records.retain(|_, record| !record.is_expired_at(now));
        Ok((before - records.len()) as u64)
    }

    async fn count(&self) -> SessionResult<u64> {
        self.check()?;
        Ok(self.records.read().len() as u64)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
