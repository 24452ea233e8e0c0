//! Periodic garbage collection of expired sessions.

use crate::config::ProviderConfig;
use crate::error::{SessionError, SessionResult};
use crate::traits::SessionProvider;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Runs [`SessionProvider::gc`] on a fixed interval.
///
/// The first sweep happens one interval after [`spawn`](Self::spawn).
///
/// # Examples
///
/// ```no_run
/// use armature_docstore_session::*;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), SessionError> {
/// let config = ProviderConfig::from_env();
/// let provider = Arc::new(MongoSessionProvider::connect(config.clone()).await?);
///
/// let gc = GcScheduler::from_config(&config).spawn(provider)?;
/// // ... serve requests ...
/// gc.stop();
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct GcScheduler {
    interval: Duration,
}

impl GcScheduler {
    /// Create a scheduler sweeping every `interval`.
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Create a scheduler using `config.gc_interval`.
    pub fn from_config(config: &ProviderConfig) -> Self {
        Self::new(config.gc_interval)
    }

    /// The sweep interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start sweeping `provider` in a background task.
    ///
    /// Sweep failures are logged and the next sweep runs as scheduled.
    pub fn spawn(&self, provider: Arc<dyn SessionProvider>) -> SessionResult<GcHandle> {
        if self.interval.is_zero() {
            return Err(SessionError::Config(
                "gc interval must be greater than zero".to_string(),
            ));
        }

        let interval = self.interval;
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                match provider.gc().await {
                    Ok(removed) => debug!(removed, "Session GC sweep finished"),
                    Err(e) => warn!(error = %e, "Session GC sweep failed"),
                }
            }
        });

        info!(interval_secs = interval.as_secs(), "Session GC scheduled");
        Ok(GcHandle { handle })
    }
}

/// Handle to a running GC task. Dropping it stops the task.
#[derive(Debug)]
pub struct GcHandle {
    handle: JoinHandle<()>,
}

impl GcHandle {
    /// Stop sweeping.
    pub fn stop(self) {
        self.handle.abort();
        debug!("Session GC stopped");
    }

    /// Whether the task is still running.
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for GcHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
