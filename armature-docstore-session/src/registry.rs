//! Named session providers.
//!
//! A framework resolves its configured provider name (e.g. `"mongodb"`)
//! against a [`ProviderRegistry`] filled by start-up code.

use crate::config::ProviderConfig;
use crate::error::{SessionError, SessionResult};
use crate::provider::MemorySessionProvider;
use crate::traits::SessionProvider;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Registry name of the MongoDB provider.
pub const MONGODB_PROVIDER: &str = "mongodb";

/// Registry name of the memory provider.
pub const MEMORY_PROVIDER: &str = "memory";

/// Map from provider name to provider.
///
/// # Examples
///
/// ```
/// use armature_docstore_session::*;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), SessionError> {
/// let mut registry = ProviderRegistry::new();
/// registry.register("memory", Arc::new(MemorySessionProvider::new(ProviderConfig::memory())))?;
///
/// let provider = registry.get("memory").unwrap();
/// provider.init(Duration::from_secs(60), "memory://").await?;
/// let session = provider.read("abc").await?;
/// assert_eq!(session.id(), "abc");
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn SessionProvider>>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `provider` under `name`.
    ///
    /// Fails if the name is empty or already taken.
    pub fn register(
        &mut self,
        name: &str,
        provider: Arc<dyn SessionProvider>,
    ) -> SessionResult<()> {
        if name.is_empty() {
            return Err(SessionError::Registry(
                "provider name must not be empty".to_string(),
            ));
        }
        if self.providers.contains_key(name) {
            return Err(SessionError::Registry(format!(
                "provider '{}' is already registered",
                name
            )));
        }

        self.providers.insert(name.to_string(), provider);
        info!(provider = name, "Session provider registered");
        Ok(())
    }

    /// Look a provider up by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn SessionProvider>> {
        self.providers.get(name).cloned()
    }

    /// Check if a name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered providers.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .finish()
    }
}

/// Register the built-in providers, not yet connected.
///
/// Registers `"memory"` and, with the `mongodb` feature, `"mongodb"`. The
/// framework calls [`SessionProvider::init`] on the one it selects.
pub fn register_builtin_providers(
    registry: &mut ProviderRegistry,
    config: &ProviderConfig,
) -> SessionResult<()> {
    registry.register(
        MEMORY_PROVIDER,
        Arc::new(MemorySessionProvider::new(config.clone())),
    )?;

    #[cfg(feature = "mongodb")]
    registry.register(
        MONGODB_PROVIDER,
        Arc::new(crate::provider::MongoSessionProvider::new(config.clone())),
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_provider() -> Arc<dyn SessionProvider> {
        Arc::new(MemorySessionProvider::new(ProviderConfig::memory()))
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = ProviderRegistry::new();
        assert!(registry.is_empty());

        registry.register("memory", memory_provider()).unwrap();
        assert!(registry.contains("memory"));
        assert!(registry.get("memory").is_some());
        assert!(registry.get("redis").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_and_empty_names() {
        let mut registry = ProviderRegistry::new();
        registry.register("memory", memory_provider()).unwrap();

        assert!(matches!(
            registry.register("memory", memory_provider()),
            Err(SessionError::Registry(_))
        ));
        assert!(matches!(
            registry.register("", memory_provider()),
            Err(SessionError::Registry(_))
        ));
    }

    #[test]
    fn test_builtin_providers() {
        let mut registry = ProviderRegistry::new();
        register_builtin_providers(&mut registry, &ProviderConfig::default()).unwrap();

        assert!(registry.contains(MEMORY_PROVIDER));
        #[cfg(feature = "mongodb")]
        assert_eq!(registry.names(), vec![MEMORY_PROVIDER, MONGODB_PROVIDER]);

        // Registering twice is refused
        assert!(register_builtin_providers(&mut registry, &ProviderConfig::default()).is_err());
    }
}
