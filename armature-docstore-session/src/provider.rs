//! Document-store session provider.

use crate::backend::DocumentBackend;
use crate::clock::{Clock, SystemClock};
use crate::codec::{JsonCodec, SessionCodec, decode_blob};
use crate::config::{ErrorPolicy, ProviderConfig};
use crate::error::{SessionError, SessionResult};
use crate::memory_backend::MemoryBackend;
use crate::store::DocumentSessionStore;
use crate::traits::{SessionProvider, SessionStore, validate_session_id};
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Provider over the in-process memory backend.
pub type MemorySessionProvider = DocumentSessionProvider<MemoryBackend>;

/// Session view handed out by [`MemorySessionProvider`].
pub type MemorySessionStore = DocumentSessionStore<MemoryBackend>;

/// Provider over MongoDB.
#[cfg(feature = "mongodb")]
pub type MongoSessionProvider = DocumentSessionProvider<crate::mongodb_backend::MongoBackend>;

/// Session view handed out by [`MongoSessionProvider`].
#[cfg(feature = "mongodb")]
pub type MongoSessionStore = DocumentSessionStore<crate::mongodb_backend::MongoBackend>;

/// Session provider backed by a document collection.
///
/// Holds one shared backend handle, opened by [`init`](Self::init). Every
/// operation clones the handle for its own duration; the database driver
/// checks pooled connections in and out underneath.
///
/// # Examples
///
/// ```no_run
/// use armature_docstore_session::*;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> Result<(), SessionError> {
///     let config = ProviderConfig::mongodb("mongodb://localhost:27017/app")?
///         .with_max_lifetime(Duration::from_secs(3600));
///     let provider = MongoSessionProvider::connect(config).await?;
///
///     let session = provider.read("4b1c-session-id").await?;
///     session.set_value("username", "alice")?;
///     session.release().await?;
///
///     // Rotate the id after login
///     let session = provider.regenerate("4b1c-session-id", &generate_session_id()).await?;
///     assert_eq!(session.get_as::<String>("username").as_deref(), Some("alice"));
///
///     Ok(())
/// }
/// ```
pub struct DocumentSessionProvider<B: DocumentBackend> {
    backend: RwLock<Option<Arc<B>>>,
    config: parking_lot::RwLock<ProviderConfig>,
    codec: Arc<dyn SessionCodec>,
    clock: Arc<dyn Clock>,
}

/// Per-operation copy of the settings a call needs.
#[derive(Debug, Clone, Copy)]
struct Settings {
    max_lifetime: Duration,
    max_lifetime_secs: i64,
    policy: ErrorPolicy,
    timeout: Option<Duration>,
}

impl<B: DocumentBackend> DocumentSessionProvider<B> {
    /// Create a provider that is not connected yet.
    ///
    /// Call [`init`](Self::init) before using it.
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            backend: RwLock::new(None),
            config: parking_lot::RwLock::new(config),
            codec: Arc::new(JsonCodec),
            clock: Arc::new(SystemClock),
        }
    }

    /// Create a provider and connect it to `config.url`.
    pub async fn connect(config: ProviderConfig) -> SessionResult<Self> {
        config.validate()?;
        let max_lifetime = config.max_lifetime;
        let url = config.url.clone();

        let provider = Self::new(config);
        provider.init(max_lifetime, &url).await?;
        Ok(provider)
    }

    /// Create a provider around an already open backend.
    pub fn with_backend(config: ProviderConfig, backend: Arc<B>) -> Self {
        Self {
            backend: RwLock::new(Some(backend)),
            ..Self::new(config)
        }
    }

    /// Use another codec for the session data blob.
    pub fn with_codec(mut self, codec: Arc<dyn SessionCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// Use another time source for expiry.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Copy of the current configuration.
    pub fn config(&self) -> ProviderConfig {
        self.config.read().clone()
    }

    /// Whether a backend handle is open.
    pub async fn is_initialized(&self) -> bool {
        self.backend.read().await.is_some()
    }

    /// Connect to `target`, or keep the live connection if there is one.
    ///
    /// `max_lifetime` and `target` are recorded either way.
    pub async fn init(&self, max_lifetime: Duration, target: &str) -> SessionResult<()> {
        let config = {
            let mut config = self.config.write();
            config.max_lifetime = max_lifetime;
            config.url = target.to_string();
            config.clone()
        };

        let mut backend = self.backend.write().await;
        if backend.is_some() {
            debug!(url = target, "Session provider already connected, reusing handle");
            return Ok(());
        }

        let connected = with_deadline(config.operation_timeout, B::connect(target, &config))
            .await
            .map_err(|e| match e {
                SessionError::Timeout => {
                    SessionError::Connection(format!("timed out connecting to {}", target))
                }
                other => other,
            })?;

        info!(
            backend = connected.name(),
            max_lifetime_secs = max_lifetime.as_secs(),
            "Session provider initialized"
        );
        *backend = Some(Arc::new(connected));
        Ok(())
    }

    /// Open the session `sid`, creating an empty record if none exists.
    ///
    /// An existing record keeps its data and its expiry.
    pub async fn read(&self, sid: &str) -> SessionResult<DocumentSessionStore<B>> {
        validate_session_id(sid)?;
        let backend = self.handle().await?;
        let settings = self.settings();

        let expire = self.expire_at(&settings);
        let record = with_deadline(settings.timeout, backend.find_or_insert(sid, expire)).await?;
        let values = decode_blob(self.codec.as_ref(), record.session_data.as_deref())?;

        debug!(session_id = sid, keys = values.len(), "Session read");
        Ok(DocumentSessionStore::new(
            sid,
            values,
            settings.max_lifetime,
            backend,
            self.codec.clone(),
            settings.policy,
            settings.timeout,
        ))
    }

    /// Check whether a record for `sid` exists.
    ///
    /// Under [`ErrorPolicy::Lenient`] any failure reads as `false`.
    pub async fn exists(&self, sid: &str) -> SessionResult<bool> {
        let result = self.try_exists(sid).await;
        self.advisory("exists", result, false)
    }

    async fn try_exists(&self, sid: &str) -> SessionResult<bool> {
        validate_session_id(sid)?;
        let backend = self.handle().await?;
        let timeout = self.settings().timeout;
        let record = with_deadline(timeout, backend.find(sid)).await?;
        Ok(record.is_some())
    }

    /// Move the session `old_sid` to `sid` with a fresh expiry.
    ///
    /// Data stored under `old_sid` is carried over; if `old_sid` does not
    /// exist an empty session is created under `sid`. Fails if `sid` is
    /// already in use by another session.
    pub async fn regenerate(
        &self,
        old_sid: &str,
        sid: &str,
    ) -> SessionResult<DocumentSessionStore<B>> {
        validate_session_id(old_sid)?;
        validate_session_id(sid)?;
        let backend = self.handle().await?;
        let settings = self.settings();

        let expire = self.expire_at(&settings);
        let record =
            with_deadline(settings.timeout, backend.rename_or_insert(old_sid, sid, expire)).await?;
        let values = decode_blob(self.codec.as_ref(), record.session_data.as_deref())?;

        debug!(old_session_id = old_sid, session_id = sid, "Session regenerated");
        Ok(DocumentSessionStore::new(
            sid,
            values,
            settings.max_lifetime,
            backend,
            self.codec.clone(),
            settings.policy,
            settings.timeout,
        ))
    }

    /// Delete the session `sid`.
    pub async fn destroy(&self, sid: &str) -> SessionResult<()> {
        validate_session_id(sid)?;
        let backend = self.handle().await?;
        let timeout = self.settings().timeout;
        with_deadline(timeout, backend.delete(sid)).await?;

        debug!(session_id = sid, "Session destroyed");
        Ok(())
    }

    /// Delete every session whose expiry is strictly before now.
    ///
    /// Under [`ErrorPolicy::Lenient`] a failed sweep removes nothing and
    /// reports 0; expired sessions wait for the next sweep.
    pub async fn gc(&self) -> SessionResult<u64> {
        let result = self.try_gc().await;
        self.advisory("gc", result, 0)
    }

    async fn try_gc(&self) -> SessionResult<u64> {
        let backend = self.handle().await?;
        let timeout = self.settings().timeout;
        let now = self.clock.now();

        let removed = with_deadline(timeout, backend.delete_expired(now)).await?;
        if removed > 0 {
            info!(removed, "Expired sessions collected");
        } else {
            debug!("Session GC sweep found nothing to collect");
        }
        Ok(removed)
    }

    /// Count stored sessions, expired ones included.
    ///
    /// Under [`ErrorPolicy::Lenient`] any failure reads as 0.
    pub async fn count(&self) -> SessionResult<u64> {
        let result = self.try_count().await;
        self.advisory("count", result, 0)
    }

    async fn try_count(&self) -> SessionResult<u64> {
        let backend = self.handle().await?;
        let timeout = self.settings().timeout;
        with_deadline(timeout, backend.count()).await
    }

    async fn handle(&self) -> SessionResult<Arc<B>> {
        self.backend
            .read()
            .await
            .clone()
            .ok_or_else(|| {
                SessionError::Connection("session provider is not initialized".to_string())
            })
    }

    fn settings(&self) -> Settings {
        let config = self.config.read();
        Settings {
            max_lifetime: config.max_lifetime,
            max_lifetime_secs: config.max_lifetime_secs(),
            policy: config.error_policy,
            timeout: config.operation_timeout,
        }
    }

    fn expire_at(&self, settings: &Settings) -> i64 {
        self.clock.now().saturating_add(settings.max_lifetime_secs)
    }

    fn advisory<T>(
        &self,
        operation: &'static str,
        result: SessionResult<T>,
        fallback: T,
    ) -> SessionResult<T> {
        match result {
            Ok(value) => Ok(value),
            Err(e) if self.settings().policy.is_lenient() => {
                warn!(operation, error = %e, "Session operation failed, using fallback");
                Ok(fallback)
            }
            Err(e) => Err(e),
        }
    }
}

impl<B: DocumentBackend> fmt::Debug for DocumentSessionProvider<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentSessionProvider")
            .field("config", &*self.config.read())
            .field("codec", &self.codec.name())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<B: DocumentBackend> SessionProvider for DocumentSessionProvider<B> {
    async fn init(&self, max_lifetime: Duration, target: &str) -> SessionResult<()> {
        DocumentSessionProvider::init(self, max_lifetime, target).await
    }

    async fn read(&self, sid: &str) -> SessionResult<Box<dyn SessionStore>> {
        let store = DocumentSessionProvider::read(self, sid).await?;
        Ok(Box::new(store))
    }

    async fn exists(&self, sid: &str) -> SessionResult<bool> {
        DocumentSessionProvider::exists(self, sid).await
    }

    async fn regenerate(&self, old_sid: &str, sid: &str) -> SessionResult<Box<dyn SessionStore>> {
        let store = DocumentSessionProvider::regenerate(self, old_sid, sid).await?;
        Ok(Box::new(store))
    }

    async fn destroy(&self, sid: &str) -> SessionResult<()> {
        DocumentSessionProvider::destroy(self, sid).await
    }

    async fn gc(&self) -> SessionResult<u64> {
        DocumentSessionProvider::gc(self).await
    }

    async fn count(&self) -> SessionResult<u64> {
        DocumentSessionProvider::count(self).await
    }
}

/// Run a backend call under an optional deadline.
pub(crate) async fn with_deadline<T, F>(timeout: Option<Duration>, operation: F) -> SessionResult<T>
where
    F: Future<Output = SessionResult<T>>,
{
    match timeout {
        Some(limit) => tokio::time::timeout(limit, operation)
            .await
            .map_err(|_| SessionError::Timeout)?,
        None => operation.await,
    }
}
