//! Per-provider circuit breaking
//!
//! Stops sending traffic to a repeatedly failing provider for a cooldown
//! period. Reopening is purely time-based: once the cooldown has elapsed, the
//! next eligibility check clears the circuit and resets the failure count,
//! permitting one exploratory call. A renewed failure then re-accumulates
//! toward the threshold. There is no half-open probe-and-decide gate; the
//! health tracker layered above suppresses providers that keep flapping.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use speech_core::CircuitBreakerConfig;
use tracing::{debug, info, warn};

/// Breaker state for one provider
#[derive(Debug, Default)]
struct BreakerEntry {
    open: bool,
    opened_at: Option<Instant>,
    failure_count: u32,
}

/// Circuit breakers for all registered providers, keyed by provider id
///
/// Each id gets an independently locked entry; concurrent completions for
/// the same provider serialize on that entry only.
#[derive(Debug)]
pub struct CircuitBreakerBank {
    failure_threshold: u32,
    cooldown: Duration,
    entries: RwLock<HashMap<String, Arc<Mutex<BreakerEntry>>>>,
}

impl CircuitBreakerBank {
    /// Create a bank from circuit breaker configuration
    #[must_use]
    pub fn new(config: &CircuitBreakerConfig) -> Self {
        Self {
            failure_threshold: config.failure_threshold,
            cooldown: Duration::from_millis(config.cooldown_ms),
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn entry(&self, provider_id: &str) -> Arc<Mutex<BreakerEntry>> {
        if let Some(entry) = self.entries.read().get(provider_id) {
            return Arc::clone(entry);
        }

        let mut entries = self.entries.write();
        Arc::clone(
            entries
                .entry(provider_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(BreakerEntry::default()))),
        )
    }

    /// Check whether a provider may be called
    ///
    /// Applies the cooldown-based implicit close-attempt: an open circuit
    /// whose cooldown has elapsed is cleared (failure count reset to 0)
    /// before this reports eligible, so the caller gets exactly one
    /// exploratory attempt.
    #[must_use]
    pub fn check_eligible(&self, provider_id: &str) -> bool {
        let entry = self.entry(provider_id);
        let mut state = entry.lock();

        if !state.open {
            return true;
        }

        let elapsed = state.opened_at.map(|at| at.elapsed());
        if elapsed.is_some_and(|e| e > self.cooldown) {
            info!(
                provider = %provider_id,
                "Circuit cooldown elapsed, permitting exploratory call"
            );
            state.open = false;
            state.opened_at = None;
            state.failure_count = 0;
            return true;
        }

        debug!(provider = %provider_id, "Circuit open, skipping provider");
        false
    }

    /// Record a failed call
    pub fn record_failure(&self, provider_id: &str) {
        let entry = self.entry(provider_id);
        let mut state = entry.lock();

        state.failure_count += 1;
        if !state.open && state.failure_count >= self.failure_threshold {
            state.open = true;
            state.opened_at = Some(Instant::now());
            warn!(
                provider = %provider_id,
                failures = state.failure_count,
                "Circuit opened"
            );
        }
    }

    /// Record a successful call, resetting the failure count
    pub fn record_success(&self, provider_id: &str) {
        let entry = self.entry(provider_id);
        entry.lock().failure_count = 0;
    }

    /// Non-mutating view of a provider's circuit state (for health export)
    ///
    /// Unlike [`Self::check_eligible`], this never applies the implicit
    /// close-attempt, so a dashboard poll cannot consume the exploratory
    /// call a real request is entitled to.
    #[must_use]
    pub fn is_open(&self, provider_id: &str) -> bool {
        self.entries
            .read()
            .get(provider_id)
            .is_some_and(|entry| entry.lock().open)
    }

    /// Drop all entries (orchestrator shutdown)
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bank(threshold: u32, cooldown_ms: u64) -> CircuitBreakerBank {
        CircuitBreakerBank::new(&CircuitBreakerConfig {
            failure_threshold: threshold,
            cooldown_ms,
        })
    }

    #[test]
    fn unknown_provider_is_eligible() {
        let b = bank(3, 60_000);
        assert!(b.check_eligible("never-seen"));
        assert!(!b.is_open("never-seen"));
    }

    #[test]
    fn opens_at_failure_threshold() {
        let b = bank(3, 60_000);

        b.record_failure("a");
        b.record_failure("a");
        assert!(!b.is_open("a"));
        assert!(b.check_eligible("a"));

        b.record_failure("a");
        assert!(b.is_open("a"));
        assert!(!b.check_eligible("a"));
    }

    #[test]
    fn success_resets_failure_count() {
        let b = bank(2, 60_000);

        b.record_failure("a");
        b.record_success("a");
        b.record_failure("a");
        // The streak restarted, so the circuit stays closed.
        assert!(!b.is_open("a"));
    }

    #[test]
    fn open_circuit_skips_regardless_of_further_failures() {
        let b = bank(2, 60_000);

        b.record_failure("a");
        b.record_failure("a");
        assert!(!b.check_eligible("a"));
        assert!(!b.check_eligible("a"));
    }

    #[test]
    fn cooldown_elapse_permits_one_exploratory_call() {
        let b = bank(2, 10); // 10ms cooldown

        b.record_failure("a");
        b.record_failure("a");
        assert!(!b.check_eligible("a"));

        std::thread::sleep(Duration::from_millis(25));

        // First check after cooldown clears the circuit and resets the count.
        assert!(b.check_eligible("a"));
        assert!(!b.is_open("a"));

        // A single renewed failure is below the threshold again.
        b.record_failure("a");
        assert!(!b.is_open("a"));
        b.record_failure("a");
        assert!(b.is_open("a"));
    }

    #[test]
    fn entries_are_per_provider() {
        let b = bank(1, 60_000);

        b.record_failure("a");
        assert!(b.is_open("a"));
        assert!(b.check_eligible("b"));
        assert!(!b.is_open("b"));
    }

    #[test]
    fn is_open_does_not_consume_exploratory_call() {
        let b = bank(1, 10);

        b.record_failure("a");
        std::thread::sleep(Duration::from_millis(25));

        // The dashboard view still reports open; only an eligibility check
        // applies the implicit close-attempt.
        assert!(b.is_open("a"));
        assert!(b.check_eligible("a"));
        assert!(!b.is_open("a"));
    }

    #[test]
    fn clear_drops_all_entries() {
        let b = bank(1, 60_000);

        b.record_failure("a");
        assert!(b.is_open("a"));

        b.clear();
        assert!(!b.is_open("a"));
        assert!(b.check_eligible("a"));
    }
}
