//! Memoized detection of optional schema features.
//!
//! A capability flag records whether a view or column exists on a given data
//! source. Detection runs at most once per `(source, feature)` key: concurrent
//! first callers wait on the same in-flight detection and observe the same
//! result. A failed detection memoizes `false`.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::OnceCell;

/// Default deadline for a single detection query.
pub const DEFAULT_DETECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Identity of one capability flag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CapabilityKey {
    /// Data source identity.
    pub source: String,
    /// Feature name, e.g. `"V$ARCH_APPLY_INFO"`.
    pub feature: String,
}

impl CapabilityKey {
    /// Create a key.
    pub fn new(source: impl Into<String>, feature: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            feature: feature.into(),
        }
    }
}

impl std::fmt::Display for CapabilityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.source, self.feature)
    }
}

/// Process-lifetime cache of capability flags, shared by every probe.
pub struct CapabilityCache {
    flags: Mutex<HashMap<CapabilityKey, Arc<OnceCell<bool>>>>,
    detect_timeout: Duration,
}

impl std::fmt::Debug for CapabilityCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityCache")
            .field("detect_timeout", &self.detect_timeout)
            .field("flags", &self.lock().len())
            .finish()
    }
}

impl Default for CapabilityCache {
    fn default() -> Self {
        Self::new(DEFAULT_DETECT_TIMEOUT)
    }
}

impl CapabilityCache {
    /// Create an empty cache whose detections are bounded by `detect_timeout`.
    pub fn new(detect_timeout: Duration) -> Self {
        Self {
            flags: Mutex::new(HashMap::new()),
            detect_timeout,
        }
    }

    /// Resolve a capability flag, running `detect` only if it was never resolved.
    ///
    /// `detect` errors and timeouts resolve to `false` and are never retried.
    ///
    /// Detection runs inside the caller's future. If that future is dropped
    /// before detection finishes, for instance when a scrape is abandoned,
    /// nothing is memoized and the next caller detects again.
    pub async fn probe<F, Fut, E>(&self, source: &str, feature: &str, detect: F) -> bool
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<bool, E>>,
        E: std::fmt::Display,
    {
        let key = CapabilityKey::new(source, feature);
        let cell = Arc::clone(self.lock().entry(key.clone()).or_default());

        *cell
            .get_or_init(|| async {
                match tokio::time::timeout(self.detect_timeout, detect()).await {
                    Ok(Ok(present)) => {
                        tracing::info!(capability = %key, present, "Capability detected");
                        present
                    }
                    Ok(Err(e)) => {
                        tracing::warn!(capability = %key, error = %e,
                            "Capability detection failed, treating feature as absent");
                        false
                    }
                    Err(_) => {
                        tracing::warn!(capability = %key, timeout_ms = self.detect_timeout.as_millis(),
                            "Capability detection timed out, treating feature as absent");
                        false
                    }
                }
            })
            .await
    }

    /// Memoized value, if detection already completed.
    pub fn cached(&self, source: &str, feature: &str) -> Option<bool> {
        self.lock()
            .get(&CapabilityKey::new(source, feature))
            .and_then(|cell| cell.get().copied())
    }

    /// Forget one flag so the next [`probe`](Self::probe) detects again.
    pub fn reset_key(&self, source: &str, feature: &str) {
        self.lock().remove(&CapabilityKey::new(source, feature));
    }

    /// Forget every flag, e.g. after a schema migration.
    pub fn reset(&self) {
        self.lock().clear();
        tracing::info!("Capability cache reset");
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<CapabilityKey, Arc<OnceCell<bool>>>> {
        self.flags.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
