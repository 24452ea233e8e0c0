//! In-memory session view.

use crate::backend::DocumentBackend;
use crate::codec::{SessionCodec, SessionValues, Value};
use crate::config::ErrorPolicy;
use crate::error::{SessionError, SessionResult};
use crate::provider::with_deadline;
use crate::traits::SessionStore;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Values of one session, staged in memory until released.
///
/// Created by [`DocumentSessionProvider::read`](crate::DocumentSessionProvider::read)
/// and [`regenerate`](crate::DocumentSessionProvider::regenerate); every call
/// returns a fresh, independent snapshot. Concurrent releases of the same
/// session id overwrite each other, last write wins.
///
/// # Examples
///
/// ```
/// use armature_docstore_session::*;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), SessionError> {
/// let provider = MemorySessionProvider::connect(ProviderConfig::memory()).await?;
///
/// let session = provider.read("sid-1").await?;
/// session.set_value("user_id", 123)?;
/// session.release().await?;
///
/// let session = provider.read("sid-1").await?;
/// assert_eq!(session.get_as::<i32>("user_id"), Some(123));
/// # Ok(())
/// # }
/// ```
pub struct DocumentSessionStore<B: DocumentBackend> {
    sid: String,
    values: RwLock<SessionValues>,
    max_lifetime: Duration,
    backend: Arc<B>,
    codec: Arc<dyn SessionCodec>,
    policy: ErrorPolicy,
    timeout: Option<Duration>,
}

impl<B: DocumentBackend> DocumentSessionStore<B> {
    pub(crate) fn new(
        sid: impl Into<String>,
        values: SessionValues,
        max_lifetime: Duration,
        backend: Arc<B>,
        codec: Arc<dyn SessionCodec>,
        policy: ErrorPolicy,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            sid: sid.into(),
            values: RwLock::new(values),
            max_lifetime,
            backend,
            codec,
            policy,
            timeout,
        }
    }

    /// The session id.
    pub fn id(&self) -> &str {
        &self.sid
    }

    /// Lifetime the provider applied when this view was created.
    pub fn max_lifetime(&self) -> Duration {
        self.max_lifetime
    }

    /// Get a value, or `None` if the key is unset.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.values.write().get(key).cloned()
    }

    /// Get a value converted to `T`.
    ///
    /// Returns `None` if the key is unset or holds a value of another shape.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|v| serde_json::from_value(v).ok())
    }

    /// Insert or overwrite a value.
    pub fn set(&self, key: &str, value: Value) {
        self.values.write().insert(key.to_string(), value);
    }

    /// Insert or overwrite a value converted from `T`.
    ///
    /// Fails with [`SessionError::Encode`] if `T` has no value
    /// representation, e.g. a map with non-string keys.
    pub fn set_value<T: Serialize>(&self, key: &str, value: T) -> SessionResult<()> {
        let value = serde_json::to_value(value).map_err(|e| SessionError::Encode(e.to_string()))?;
        self.set(key, value);
        Ok(())
    }

    /// Remove a value, returning it if it was set.
    pub fn delete(&self, key: &str) -> Option<Value> {
        self.values.write().remove(key)
    }

    /// Drop every value.
    pub fn clear(&self) {
        *self.values.write() = SessionValues::new();
    }

    /// Check if a key is set.
    pub fn contains(&self, key: &str) -> bool {
        self.values.write().contains_key(key)
    }

    /// All keys currently set.
    pub fn keys(&self) -> Vec<String> {
        self.values.write().keys().cloned().collect()
    }

    /// Number of keys set.
    pub fn len(&self) -> usize {
        self.values.write().len()
    }

    /// Whether no key is set.
    pub fn is_empty(&self) -> bool {
        self.values.write().is_empty()
    }

    /// Copy of the current values.
    pub fn snapshot(&self) -> SessionValues {
        self.values.write().clone()
    }

    /// Write the current values back to the record.
    ///
    /// The record is updated, never created. Under
    /// [`ErrorPolicy::Lenient`] a failed write is logged and dropped, and
    /// the next read sees the previous data.
    pub async fn release(&self) -> SessionResult<()> {
        match self.persist().await {
            Ok(()) => Ok(()),
            Err(e) if self.policy.is_lenient() => {
                warn!(
                    session_id = %self.sid,
                    error = %e,
                    "Session release failed, changes dropped"
                );
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn persist(&self) -> SessionResult<()> {
        let blob = {
            let values = self.values.write();
            self.codec.encode(&values)?
        };
        let size = blob.len();

        let matched = with_deadline(self.timeout, self.backend.update_data(&self.sid, blob)).await?;
        if !matched {
            return Err(SessionError::NotFound(self.sid.clone()));
        }

        debug!(
            session_id = %self.sid,
            bytes = size,
            codec = self.codec.name(),
            "Session released"
        );
        Ok(())
    }
}

impl<B: DocumentBackend> fmt::Debug for DocumentSessionStore<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentSessionStore")
            .field("sid", &self.sid)
            .field("keys", &self.len())
            .field("backend", &self.backend.name())
            .field("policy", &self.policy)
            .finish()
    }
}

#[async_trait]
impl<B: DocumentBackend> SessionStore for DocumentSessionStore<B> {
    fn get(&self, key: &str) -> Option<Value> {
        DocumentSessionStore::get(self, key)
    }

    fn set(&self, key: &str, value: Value) -> SessionResult<()> {
        DocumentSessionStore::set(self, key, value);
        Ok(())
    }

    fn delete(&self, key: &str) -> SessionResult<()> {
        DocumentSessionStore::delete(self, key);
        Ok(())
    }

    fn clear(&self) -> SessionResult<()> {
        DocumentSessionStore::clear(self);
        Ok(())
    }

    fn id(&self) -> &str {
        &self.sid
    }

    async fn release(&self) -> SessionResult<()> {
        DocumentSessionStore::release(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::JsonCodec;
    use crate::memory_backend::MemoryBackend;
    use serde_json::json;
    use std::collections::HashMap;

    fn store(
        backend: Arc<MemoryBackend>,
        policy: ErrorPolicy,
    ) -> DocumentSessionStore<MemoryBackend> {
        DocumentSessionStore::new(
            "sid",
            SessionValues::new(),
            Duration::from_secs(60),
            backend,
            Arc::new(JsonCodec),
            policy,
            None,
        )
    }

    #[test]
    fn test_get_set_delete() {
        let session = store(Arc::new(MemoryBackend::new()), ErrorPolicy::Lenient);

        assert_eq!(session.get("foo"), None);
        session.set("foo", json!("bar"));
        assert_eq!(session.get("foo"), Some(json!("bar")));
        assert!(session.contains("foo"));

        assert_eq!(session.delete("foo"), Some(json!("bar")));
        assert_eq!(session.delete("foo"), None);
        assert_eq!(session.get("foo"), None);
        assert!(session.is_empty());
    }

    #[test]
    fn test_clear() {
        let session = store(Arc::new(MemoryBackend::new()), ErrorPolicy::Lenient);
        session.set("a", json!(1));
        session.set("b", json!(2));
        assert_eq!(session.len(), 2);

        session.clear();
        assert!(session.is_empty());
        assert!(session.keys().is_empty());
    }

    #[test]
    fn test_typed_values() {
        let session = store(Arc::new(MemoryBackend::new()), ErrorPolicy::Lenient);
        session.set_value("roles", vec!["admin", "dev"]).unwrap();
        assert_eq!(
            session.get_as::<Vec<String>>("roles"),
            Some(vec!["admin".to_string(), "dev".to_string()])
        );
        // Wrong shape reads as absent
        assert_eq!(session.get_as::<i64>("roles"), None);
    }

    #[test]
    fn test_unrepresentable_value_is_encode_error() {
        let session = store(Arc::new(MemoryBackend::new()), ErrorPolicy::Lenient);
        let mut map = HashMap::new();
        map.insert((1, 2), "tuple key");

        assert!(matches!(
            session.set_value("bad", map),
            Err(SessionError::Encode(_))
        ));
        assert!(!session.contains("bad"));
    }

    #[tokio::test]
    async fn test_release_writes_blob() {
        let backend = Arc::new(MemoryBackend::new());
        backend.find_or_insert("sid", i64::MAX).await.unwrap();

        let session = store(backend.clone(), ErrorPolicy::Strict);
        session.set("foo", json!("bar"));
        session.release().await.unwrap();

        let blob = backend.record("sid").unwrap().session_data.unwrap();
        let values = JsonCodec.decode(&blob).unwrap();
        assert_eq!(values.get("foo"), Some(&json!("bar")));
    }

    #[tokio::test]
    async fn test_release_missing_record() {
        let backend = Arc::new(MemoryBackend::new());

        let strict = store(backend.clone(), ErrorPolicy::Strict);
        assert!(matches!(
            strict.release().await,
            Err(SessionError::NotFound(_))
        ));

        let lenient = store(backend.clone(), ErrorPolicy::Lenient);
        assert!(lenient.release().await.is_ok());
        // Release never creates a record
        assert_eq!(backend.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_release_backend_failure() {
        let backend = Arc::new(MemoryBackend::new());
        backend.find_or_insert("sid", i64::MAX).await.unwrap();
        backend.set_unavailable(true);

        let lenient = store(backend.clone(), ErrorPolicy::Lenient);
        lenient.set("foo", json!(1));
        assert!(lenient.release().await.is_ok());

        let strict = store(backend.clone(), ErrorPolicy::Strict);
        assert!(matches!(
            strict.release().await,
            Err(SessionError::Backend(_))
        ));

        backend.set_unavailable(false);
        assert!(backend.record("sid").unwrap().session_data.is_none());
    }
}
