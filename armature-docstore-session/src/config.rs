//! Session provider configuration.

use crate::error::{SessionError, SessionResult};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Default collection holding session records.
pub const DEFAULT_COLLECTION: &str = "session";

/// How advisory operations react to backend failures.
///
/// `Exists`, `Count`, `GarbageCollect` and `Release` are best-effort under
/// [`ErrorPolicy::Lenient`]: failures are logged and a safe default is
/// returned. [`ErrorPolicy::Strict`] surfaces every error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Swallow errors in advisory operations
    #[default]
    Lenient,
    /// Propagate all errors
    Strict,
}

impl ErrorPolicy {
    /// Whether errors are swallowed.
    pub fn is_lenient(&self) -> bool {
        matches!(self, Self::Lenient)
    }
}

impl FromStr for ErrorPolicy {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lenient" => Ok(Self::Lenient),
            "strict" => Ok(Self::Strict),
            other => Err(SessionError::Config(format!(
                "unknown error policy '{}', expected 'lenient' or 'strict'",
                other
            ))),
        }
    }
}

impl fmt::Display for ErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lenient => write!(f, "lenient"),
            Self::Strict => write!(f, "strict"),
        }
    }
}

/// Session provider configuration.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Connection target (e.g. "mongodb://localhost:27017/app")
    pub url: String,
    /// Lifetime of a session from creation or regeneration
    pub max_lifetime: Duration,
    /// Interval between garbage collection sweeps
    pub gc_interval: Duration,
    /// Collection holding session records
    pub collection: String,
    /// Error handling for advisory operations
    pub error_policy: ErrorPolicy,
    /// Deadline applied to every backend call
    pub operation_timeout: Option<Duration>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            url: "mongodb://localhost:27017/session".to_string(),
            max_lifetime: Duration::from_secs(3600), // 1 hour
            gc_interval: Duration::from_secs(3600),
            collection: DEFAULT_COLLECTION.to_string(),
            error_policy: ErrorPolicy::Lenient,
            operation_timeout: None,
        }
    }
}

impl ProviderConfig {
    /// Create a MongoDB provider configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// use armature_docstore_session::ProviderConfig;
    ///
    /// let config = ProviderConfig::mongodb("mongodb://localhost:27017/app").unwrap();
    /// assert_eq!(config.collection, "session");
    /// ```
    pub fn mongodb(url: &str) -> SessionResult<Self> {
        if !url.starts_with("mongodb://") && !url.starts_with("mongodb+srv://") {
            return Err(SessionError::InvalidUrl(
                "MongoDB URL must start with mongodb:// or mongodb+srv://".to_string(),
            ));
        }

        Ok(Self {
            url: url.to_string(),
            ..Default::default()
        })
    }

    /// Create an in-process memory provider configuration.
    pub fn memory() -> Self {
        Self {
            url: crate::memory_backend::MEMORY_URL.to_string(),
            ..Default::default()
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Starts from the defaults and overrides each field whose variable is
    /// set. Unparsable values are ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("ARMATURE_SESSION_URL") {
            config.url = url;
        }

        if let Some(secs) = parse_var(&lookup, "ARMATURE_SESSION_MAX_LIFETIME") {
            config.max_lifetime = Duration::from_secs(secs);
        }

        if let Some(secs) = parse_var(&lookup, "ARMATURE_SESSION_GC_INTERVAL") {
            config.gc_interval = Duration::from_secs(secs);
        }

        if let Some(collection) = lookup("ARMATURE_SESSION_COLLECTION")
            && !collection.is_empty()
        {
            config.collection = collection;
        }

        if let Some(policy) = parse_var(&lookup, "ARMATURE_SESSION_ERROR_POLICY") {
            config.error_policy = policy;
        }

        if let Some(secs) = parse_var(&lookup, "ARMATURE_SESSION_TIMEOUT") {
            config.operation_timeout = Some(Duration::from_secs(secs));
        }

        config
    }

    /// Set the connection target.
    pub fn with_url(mut self, url: &str) -> Self {
        self.url = url.to_string();
        self
    }

    /// Set the session lifetime.
    pub fn with_max_lifetime(mut self, max_lifetime: Duration) -> Self {
        self.max_lifetime = max_lifetime;
        self
    }

    /// Set the garbage collection interval.
    pub fn with_gc_interval(mut self, interval: Duration) -> Self {
        self.gc_interval = interval;
        self
    }

    /// Set the collection name.
    pub fn with_collection(mut self, collection: &str) -> Self {
        self.collection = collection.to_string();
        self
    }

    /// Set the error policy.
    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    /// Set a deadline for each backend call.
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = Some(timeout);
        self
    }

    /// Session lifetime in whole seconds, as stored in `session_expire`.
    pub fn max_lifetime_secs(&self) -> i64 {
        i64::try_from(self.max_lifetime.as_secs()).unwrap_or(i64::MAX)
    }

    /// Check the configuration for values no backend can work with.
    pub fn validate(&self) -> SessionResult<()> {
        if self.url.is_empty() {
            return Err(SessionError::Config("connection URL is empty".to_string()));
        }
        if self.collection.is_empty() {
            return Err(SessionError::Config("collection name is empty".to_string()));
        }
        if self.gc_interval.is_zero() {
            return Err(SessionError::Config(
                "gc interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "Ignoring unparsable session config variable");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_mongodb_url_validation() {
        assert!(ProviderConfig::mongodb("mongodb://localhost:27017/app").is_ok());
        assert!(ProviderConfig::mongodb("mongodb+srv://cluster.example.com/app").is_ok());
        assert!(matches!(
            ProviderConfig::mongodb("redis://localhost:6379"),
            Err(SessionError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_builder_methods() {
        let config = ProviderConfig::memory()
            .with_max_lifetime(Duration::from_secs(5))
            .with_collection("sessions")
            .with_error_policy(ErrorPolicy::Strict)
            .with_operation_timeout(Duration::from_secs(2));

        assert_eq!(config.url, "memory://");
        assert_eq!(config.max_lifetime_secs(), 5);
        assert_eq!(config.collection, "sessions");
        assert_eq!(config.error_policy, ErrorPolicy::Strict);
        assert_eq!(config.operation_timeout, Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("ARMATURE_SESSION_URL", "mongodb://db:27017/app"),
            ("ARMATURE_SESSION_MAX_LIFETIME", "86400"),
            ("ARMATURE_SESSION_GC_INTERVAL", "not-a-number"),
            ("ARMATURE_SESSION_ERROR_POLICY", "Strict"),
            ("ARMATURE_SESSION_TIMEOUT", "3"),
        ]
        .into_iter()
        .collect();

        let config = ProviderConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.url, "mongodb://db:27017/app");
        assert_eq!(config.max_lifetime, Duration::from_secs(86400));
        // Unparsable values keep the default
        assert_eq!(config.gc_interval, Duration::from_secs(3600));
        assert_eq!(config.collection, DEFAULT_COLLECTION);
        assert_eq!(config.error_policy, ErrorPolicy::Strict);
        assert_eq!(config.operation_timeout, Some(Duration::from_secs(3)));
    }

    #[test]
    fn test_validate() {
        assert!(ProviderConfig::default().validate().is_ok());
        assert!(ProviderConfig::default().with_collection("").validate().is_err());
        assert!(
            ProviderConfig::default()
                .with_gc_interval(Duration::ZERO)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_error_policy_parse() {
        assert_eq!("lenient".parse::<ErrorPolicy>().unwrap(), ErrorPolicy::Lenient);
        assert_eq!(" STRICT ".parse::<ErrorPolicy>().unwrap(), ErrorPolicy::Strict);
        assert!("loose".parse::<ErrorPolicy>().is_err());
        assert_eq!(ErrorPolicy::Strict.to_string(), "strict");
    }
}
