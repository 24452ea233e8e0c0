//! Document-store session provider for the Armature framework.
//!
//! Sessions are kept as one record per session id in a document collection:
//!
//! | Field | Type | Meaning |
//! |-------|------|---------|
//! | `session_key` | string | unique session id |
//! | `session_data` | binary or null | encoded session values |
//! | `session_expire` | int64 | Unix time after which GC may remove the record |
//!
//! A [`SessionProvider`] opens a session by id, creating the record on first
//! use, and hands out a [`SessionStore`]: an in-memory view the request
//! handler reads and mutates. Nothing reaches the database until the view
//! is released.
//!
//! # Features
//!
//! - `mongodb` - MongoDB backend (enabled by default)
//!
//! The in-process [`MemoryBackend`] is always available.
//!
//! # Examples
//!
//! ## MongoDB Provider (Default)
//!
//! ```no_run
//! use armature_docstore_session::*;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), SessionError> {
//!     let config = ProviderConfig::mongodb("mongodb://localhost:27017/myapp")?
//!         .with_max_lifetime(Duration::from_secs(3600))
//!         .with_gc_interval(Duration::from_secs(600));
//!
//!     let provider = Arc::new(MongoSessionProvider::connect(config.clone()).await?);
//!     let _gc = GcScheduler::from_config(&config).spawn(provider.clone())?;
//!
//!     // Open (or create) the session named by the request cookie
//!     let session = provider.read("f3a1c2d4").await?;
//!     session.set_value("user_id", 123)?;
//!     session.set_value("username", "alice")?;
//!     session.release().await?;
//!
//!     // Logout
//!     provider.destroy("f3a1c2d4").await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Provider Registry
//!
//! Frameworks that pick the backend by name register providers explicitly
//! at start-up:
//!
//! ```
//! use armature_docstore_session::*;
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), SessionError> {
//! let mut registry = ProviderRegistry::new();
//! register_builtin_providers(&mut registry, &ProviderConfig::default())?;
//!
//! let provider = registry.get("memory").expect("registered above");
//! provider.init(Duration::from_secs(5), "memory://").await?;
//!
//! let session = provider.read("foo-bar").await?;
//! session.set("foo", "bar".into())?;
//! session.release().await?;
//!
//! let session = provider.read("foo-bar").await?;
//! assert_eq!(session.get("foo"), Some("bar".into()));
//! # Ok(())
//! # }
//! ```
//!
//! # Error Policy
//!
//! `exists`, `count`, `gc` and `release` are best-effort by default
//! ([`ErrorPolicy::Lenient`]): a failure is logged and `false`, `0` or
//! `Ok(())` is returned. Set [`ErrorPolicy::Strict`] to surface every error.
//! `init`, `read`, `regenerate` and `destroy` always propagate errors.

pub mod backend;
pub mod clock;
pub mod codec;
pub mod config;
pub mod error;
pub mod gc;
pub mod memory_backend;
pub mod provider;
pub mod registry;
pub mod store;
pub mod traits;

#[cfg(feature = "mongodb")]
pub mod mongodb_backend;

pub use backend::{DocumentBackend, SessionRecord};
pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::{JsonCodec, SessionCodec, SessionValues, Value};
pub use config::{ErrorPolicy, ProviderConfig};
pub use error::{SessionError, SessionResult};
pub use gc::{GcHandle, GcScheduler};
pub use memory_backend::MemoryBackend;
pub use provider::{DocumentSessionProvider, MemorySessionProvider, MemorySessionStore};
pub use registry::{
    MEMORY_PROVIDER, MONGODB_PROVIDER, ProviderRegistry, register_builtin_providers,
};
pub use store::DocumentSessionStore;
pub use traits::{SessionProvider, SessionStore, generate_session_id};

#[cfg(feature = "mongodb")]
pub use mongodb_backend::MongoBackend;

#[cfg(feature = "mongodb")]
pub use provider::{MongoSessionProvider, MongoSessionStore};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::codec::Value;
    pub use crate::config::{ErrorPolicy, ProviderConfig};
    pub use crate::error::{SessionError, SessionResult};
    pub use crate::gc::GcScheduler;
    pub use crate::provider::{DocumentSessionProvider, MemorySessionProvider};
    pub use crate::registry::{ProviderRegistry, register_builtin_providers};
    pub use crate::traits::{SessionProvider, SessionStore, generate_session_id};

    #[cfg(feature = "mongodb")]
    pub use crate::provider::MongoSessionProvider;
}
