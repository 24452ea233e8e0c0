//! Document backend contract.
//!
//! A [`DocumentBackend`] is the shared handle a provider holds on the record
//! collection. Each operation is a single atomic command against the store;
//! the provider layers expiry arithmetic, decoding and error policy on top.

use crate::config::ProviderConfig;
use crate::error::SessionResult;
use async_trait::async_trait;

/// One persisted session record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    /// Unique session identifier
    pub session_key: String,
    /// Encoded session values; `None` for a freshly created record
    pub session_data: Option<Vec<u8>>,
    /// Unix timestamp after which the record may be collected
    pub session_expire: i64,
}

impl SessionRecord {
    /// A record with no data yet.
    pub fn new(session_key: impl Into<String>, session_expire: i64) -> Self {
        Self {
            session_key: session_key.into(),
            session_data: None,
            session_expire,
        }
    }

    /// Whether a sweep at `now` removes this record.
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.session_expire < now
    }
}

/// Storage operations a session provider needs from a document database.
#[async_trait]
pub trait DocumentBackend: Send + Sync + Sized + 'static {
    /// Open a handle for `target`.
    ///
    /// Fails with `Connection` if the target is malformed or unreachable.
    async fn connect(target: &str, config: &ProviderConfig) -> SessionResult<Self>;

    /// Return the record for `key`, inserting an empty one that expires at
    /// `expire` if none exists. An existing record is returned untouched.
    async fn find_or_insert(&self, key: &str, expire: i64) -> SessionResult<SessionRecord>;

    /// Move the record at `old_key` to `new_key` and set its expiry, or
    /// create an empty record at `new_key` if `old_key` is absent.
    ///
    /// Fails with `Backend` if `new_key` already belongs to another record.
    async fn rename_or_insert(
        &self,
        old_key: &str,
        new_key: &str,
        expire: i64,
    ) -> SessionResult<SessionRecord>;

    /// Look a record up without creating it.
    async fn find(&self, key: &str) -> SessionResult<Option<SessionRecord>>;

    /// Replace the data blob of an existing record.
    ///
    /// Returns `false` if no record matched; nothing is created.
    async fn update_data(&self, key: &str, data: Vec<u8>) -> SessionResult<bool>;

    /// Delete the record for `key`, if any.
    async fn delete(&self, key: &str) -> SessionResult<()>;

    /// Delete every record with `session_expire < now`.
    async fn delete_expired(&self, now: i64) -> SessionResult<u64>;

    /// Number of stored records, expired or not.
    async fn count(&self) -> SessionResult<u64>;

    /// Backend name, for logs.
    fn name(&self) -> &'static str;
}
