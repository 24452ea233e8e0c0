//! Session provider and session store contracts.

use crate::codec::Value;
use crate::error::{SessionError, SessionResult};
use async_trait::async_trait;
use std::time::Duration;

/// Lifecycle manager for sessions kept in one backing store.
///
/// A framework holds one provider per process, usually behind an
/// `Arc<dyn SessionProvider>` taken from a
/// [`ProviderRegistry`](crate::ProviderRegistry).
///
/// # Examples
///
/// ```ignore
/// use armature_docstore_session::SessionProvider;
///
/// async fn handle(provider: &dyn SessionProvider, sid: &str) -> SessionResult<()> {
///     let session = provider.read(sid).await?;
///     session.set("visits", 1.into())?;
///     session.release().await
/// }
/// ```
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Connect to `target`, or keep the live connection if there is one.
    ///
    /// Always records `max_lifetime` and `target`, even when no new
    /// connection is made.
    async fn init(&self, max_lifetime: Duration, target: &str) -> SessionResult<()>;

    /// Open the session `sid`, creating an empty record if none exists.
    ///
    /// Reading never extends the expiry of an existing record.
    async fn read(&self, sid: &str) -> SessionResult<Box<dyn SessionStore>>;

    /// Check whether a record for `sid` exists.
    async fn exists(&self, sid: &str) -> SessionResult<bool>;

    /// Move the session `old_sid` to `sid` and refresh its expiry.
    ///
    /// Creates an empty session under `sid` if `old_sid` does not exist.
    async fn regenerate(&self, old_sid: &str, sid: &str) -> SessionResult<Box<dyn SessionStore>>;

    /// Delete the session `sid`. Deleting a missing session succeeds.
    async fn destroy(&self, sid: &str) -> SessionResult<()>;

    /// Delete every session whose expiry has passed.
    ///
    /// Returns the number of sessions removed.
    async fn gc(&self) -> SessionResult<u64>;

    /// Count stored sessions, including expired ones not yet collected.
    async fn count(&self) -> SessionResult<u64>;
}

/// In-memory view of one session, persisted on [`SessionStore::release`].
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Get a value, or `None` if the key is unset.
    fn get(&self, key: &str) -> Option<Value>;

    /// Insert or overwrite a value.
    fn set(&self, key: &str, value: Value) -> SessionResult<()>;

    /// Remove a value. Removing an unset key succeeds.
    fn delete(&self, key: &str) -> SessionResult<()>;

    /// Drop every value. The backing store is untouched until release.
    fn clear(&self) -> SessionResult<()>;

    /// The session id this view is bound to.
    fn id(&self) -> &str;

    /// Write the current values back to the backing store.
    ///
    /// Must complete before the response for this request is finalized.
    async fn release(&self) -> SessionResult<()>;
}

/// Generate a new unique session ID.
pub fn generate_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Reject ids no backend can key a record by.
pub(crate) fn validate_session_id(sid: &str) -> SessionResult<()> {
    if sid.is_empty() {
        return Err(SessionError::InvalidSessionId(
            "session id must not be empty".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique() {
        let a = generate_session_id();
        let b = generate_session_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 36);
        assert!(validate_session_id(&a).is_ok());
    }

    #[test]
    fn test_empty_id_rejected() {
        assert!(matches!(
            validate_session_id(""),
            Err(SessionError::InvalidSessionId(_))
        ));
    }
}
