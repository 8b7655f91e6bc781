//! Per-provider health tracking
//!
//! One record per provider id, updated through two paths that share the same
//! state machine: outcome-driven updates from the fallback coordinator, and
//! probe-driven updates from the orchestrator's periodic health-check task.
//!
//! Transitions: a provider goes unhealthy after `unhealthy_after` consecutive
//! failures (default 2) and healthy again on the next single success.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use speech_core::HealthConfig;
use tracing::{debug, info, warn};

/// Health state of one provider
#[derive(Debug, Clone)]
pub struct HealthRecord {
    /// Whether the provider is currently considered healthy
    pub healthy: bool,
    /// Failures since the last success
    pub consecutive_failures: u32,
    /// Successes since the last failure
    pub consecutive_successes: u32,
    /// When the record was last updated
    pub last_check: DateTime<Utc>,
}

impl Default for HealthRecord {
    fn default() -> Self {
        Self {
            healthy: true,
            consecutive_failures: 0,
            consecutive_successes: 0,
            last_check: Utc::now(),
        }
    }
}

/// Tracks health records for all registered providers
///
/// Each provider id gets an independently locked entry, so concurrent
/// in-flight requests for the same provider cannot corrupt its counters and
/// different providers need no cross-coordination.
#[derive(Debug)]
pub struct HealthTracker {
    unhealthy_after: u32,
    records: RwLock<HashMap<String, Arc<Mutex<HealthRecord>>>>,
}

impl HealthTracker {
    /// Create a tracker from health configuration
    #[must_use]
    pub fn new(config: &HealthConfig) -> Self {
        Self {
            unhealthy_after: config.unhealthy_after,
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Get or create the entry for a provider id
    fn entry(&self, provider_id: &str) -> Arc<Mutex<HealthRecord>> {
        if let Some(entry) = self.records.read().get(provider_id) {
            return Arc::clone(entry);
        }

        let mut records = self.records.write();
        Arc::clone(
            records
                .entry(provider_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(HealthRecord::default()))),
        )
    }

    /// Record a successful attempt or probe
    pub fn record_success(&self, provider_id: &str) {
        let entry = self.entry(provider_id);
        let mut record = entry.lock();

        let was_unhealthy = !record.healthy;
        record.consecutive_failures = 0;
        record.consecutive_successes += 1;
        record.healthy = true;
        record.last_check = Utc::now();

        if was_unhealthy {
            info!(provider = %provider_id, "Provider recovered, marking healthy");
        }
    }

    /// Record a failed attempt or probe
    pub fn record_failure(&self, provider_id: &str) {
        let entry = self.entry(provider_id);
        let mut record = entry.lock();

        record.consecutive_successes = 0;
        record.consecutive_failures += 1;
        record.last_check = Utc::now();

        if record.healthy && record.consecutive_failures >= self.unhealthy_after {
            record.healthy = false;
            warn!(
                provider = %provider_id,
                failures = record.consecutive_failures,
                "Provider marked unhealthy"
            );
        } else {
            debug!(
                provider = %provider_id,
                failures = record.consecutive_failures,
                "Provider failure recorded"
            );
        }
    }

    /// Whether a provider is currently considered healthy
    ///
    /// Unknown providers default to healthy so newly registered backends are
    /// eligible on first contact.
    #[must_use]
    pub fn is_healthy(&self, provider_id: &str) -> bool {
        self.records
            .read()
            .get(provider_id)
            .is_none_or(|entry| entry.lock().healthy)
    }

    /// Current record for a provider, if one exists
    #[must_use]
    pub fn record(&self, provider_id: &str) -> Option<HealthRecord> {
        self.records
            .read()
            .get(provider_id)
            .map(|entry| entry.lock().clone())
    }

    /// Snapshot of all records for health export
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, HealthRecord> {
        self.records
            .read()
            .iter()
            .map(|(id, entry)| (id.clone(), entry.lock().clone()))
            .collect()
    }

    /// Drop all records (orchestrator shutdown)
    pub fn clear(&self) {
        self.records.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> HealthTracker {
        HealthTracker::new(&HealthConfig::default())
    }

    #[test]
    fn unknown_provider_defaults_healthy() {
        let t = tracker();
        assert!(t.is_healthy("never-seen"));
        assert!(t.record("never-seen").is_none());
    }

    #[test]
    fn unhealthy_after_exactly_two_consecutive_failures() {
        let t = tracker();

        t.record_failure("a");
        assert!(t.is_healthy("a"));

        t.record_failure("a");
        assert!(!t.is_healthy("a"));
    }

    #[test]
    fn healthy_again_after_single_success() {
        let t = tracker();

        t.record_failure("a");
        t.record_failure("a");
        assert!(!t.is_healthy("a"));

        t.record_success("a");
        assert!(t.is_healthy("a"));
    }

    #[test]
    fn success_resets_failure_streak() {
        let t = tracker();

        t.record_failure("a");
        t.record_success("a");
        t.record_failure("a");
        // One failure after a success is not enough to mark unhealthy.
        assert!(t.is_healthy("a"));

        let record = t.record("a").unwrap();
        assert_eq!(record.consecutive_failures, 1);
        assert_eq!(record.consecutive_successes, 0);
    }

    #[test]
    fn counters_accumulate() {
        let t = tracker();

        t.record_success("a");
        t.record_success("a");
        let record = t.record("a").unwrap();
        assert_eq!(record.consecutive_successes, 2);
        assert_eq!(record.consecutive_failures, 0);
    }

    #[test]
    fn records_are_per_provider() {
        let t = tracker();

        t.record_failure("a");
        t.record_failure("a");
        t.record_success("b");

        assert!(!t.is_healthy("a"));
        assert!(t.is_healthy("b"));
    }

    #[test]
    fn snapshot_contains_all_providers() {
        let t = tracker();

        t.record_success("a");
        t.record_failure("b");

        let snapshot = t.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot["a"].healthy);
        assert_eq!(snapshot["b"].consecutive_failures, 1);
    }

    #[test]
    fn clear_drops_all_records() {
        let t = tracker();

        t.record_failure("a");
        t.record_failure("a");
        t.clear();

        // Cleared records fall back to the healthy default.
        assert!(t.is_healthy("a"));
        assert!(t.snapshot().is_empty());
    }

    #[test]
    fn custom_threshold_is_respected() {
        let config = HealthConfig {
            unhealthy_after: 3,
            ..Default::default()
        };
        let t = HealthTracker::new(&config);

        t.record_failure("a");
        t.record_failure("a");
        assert!(t.is_healthy("a"));

        t.record_failure("a");
        assert!(!t.is_healthy("a"));
    }
}
