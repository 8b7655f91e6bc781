//! Ordered fallback traversal over a provider chain
//!
//! One coordinator call makes at most one attempt per provider: eligibility
//! is checked (health, then circuit), the operation is invoked, the outcome
//! is fed back into both trackers, and on failure the traversal moves on.
//! The first success wins and remaining providers are never touched.
//!
//! Skips and failures are accumulated so the terminal
//! [`OrchestratorError::AllProvidersExhausted`] carries the complete story of
//! the call, one entry per provider in priority order.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use speech_core::SpeechError;
use tracing::{debug, info, warn};

use crate::breaker::CircuitBreakerBank;
use crate::error::{AttemptError, AttemptFailure, OrchestratorError, SkipReason};
use crate::health::HealthTracker;
use crate::registry::ProviderEntry;

/// Hook receiving per-attempt notifications during traversal
///
/// All methods default to no-ops; implement only what you need. Used by
/// tests and by callers that export attempt metrics.
pub trait AttemptObserver: Send + Sync {
    /// A provider was skipped without being called
    fn on_skip(&self, _provider_id: &str, _reason: SkipReason) {}

    /// A provider produced a result
    fn on_success(&self, _provider_id: &str) {}

    /// A provider was called and failed
    fn on_failure(&self, _provider_id: &str, _error: &SpeechError) {}
}

/// Traverses provider chains with stop-on-first-success semantics
pub struct FallbackCoordinator {
    health: Arc<HealthTracker>,
    breakers: Arc<CircuitBreakerBank>,
    observer: Option<Arc<dyn AttemptObserver>>,
}

impl fmt::Debug for FallbackCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackCoordinator")
            .field("health", &self.health)
            .field("breakers", &self.breakers)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

impl FallbackCoordinator {
    /// Create a coordinator feeding outcomes into the given trackers
    #[must_use]
    pub const fn new(health: Arc<HealthTracker>, breakers: Arc<CircuitBreakerBank>) -> Self {
        Self {
            health,
            breakers,
            observer: None,
        }
    }

    /// Attach an attempt observer
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn AttemptObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Run `op` against the chain until one provider succeeds
    ///
    /// With `allow_fallback == false` only the first provider is called and
    /// its error propagates directly, bypassing eligibility checks; the
    /// outcome is still recorded into both trackers.
    ///
    /// # Errors
    ///
    /// - `NoProvidersAvailable` if the chain is empty.
    /// - `AllProvidersExhausted` once every provider was attempted or
    ///   skipped, carrying per-provider outcomes in priority order.
    /// - `Provider` when fallback is disabled and the sole attempt failed.
    pub async fn execute<P, T, F, Fut>(
        &self,
        chain: &[Arc<ProviderEntry<P>>],
        allow_fallback: bool,
        op: F,
    ) -> Result<T, OrchestratorError>
    where
        P: ?Sized,
        F: Fn(Arc<ProviderEntry<P>>) -> Fut,
        Fut: Future<Output = Result<T, SpeechError>>,
    {
        let Some(first) = chain.first() else {
            return Err(OrchestratorError::NoProvidersAvailable);
        };

        if !allow_fallback {
            return match self.attempt(first, &op).await {
                Ok(value) => Ok(value),
                Err(error) => Err(OrchestratorError::Provider(error)),
            };
        }

        let mut attempts = Vec::with_capacity(chain.len());

        for entry in chain {
            if let Some(reason) = self.skip_reason(&entry.id) {
                debug!(provider = %entry.id, %reason, "Skipping provider");
                if let Some(observer) = &self.observer {
                    observer.on_skip(&entry.id, reason);
                }
                attempts.push(AttemptError {
                    provider_id: entry.id.clone(),
                    failure: AttemptFailure::Skipped(reason),
                });
                continue;
            }

            match self.attempt(entry, &op).await {
                Ok(value) => {
                    if !attempts.is_empty() {
                        info!(
                            provider = %entry.id,
                            prior_attempts = attempts.len(),
                            "Fallback provider succeeded"
                        );
                    }
                    return Ok(value);
                }
                Err(error) => {
                    attempts.push(AttemptError {
                        provider_id: entry.id.clone(),
                        failure: AttemptFailure::Failed(error),
                    });
                }
            }
        }

        warn!(attempts = attempts.len(), "All providers exhausted");
        Err(OrchestratorError::AllProvidersExhausted { attempts })
    }

    /// Eligibility check: health first, then circuit
    ///
    /// The circuit check is only reached for healthy providers, so a skip
    /// never consumes an open circuit's exploratory call needlessly.
    fn skip_reason(&self, provider_id: &str) -> Option<SkipReason> {
        if !self.health.is_healthy(provider_id) {
            return Some(SkipReason::Unhealthy);
        }
        if !self.breakers.check_eligible(provider_id) {
            return Some(SkipReason::CircuitOpen);
        }
        None
    }

    /// One attempt against one provider, outcome recorded into both trackers
    async fn attempt<P, T, F, Fut>(
        &self,
        entry: &Arc<ProviderEntry<P>>,
        op: &F,
    ) -> Result<T, SpeechError>
    where
        P: ?Sized,
        F: Fn(Arc<ProviderEntry<P>>) -> Fut,
        Fut: Future<Output = Result<T, SpeechError>>,
    {
        debug!(provider = %entry.id, "Attempting provider");

        match op(Arc::clone(entry)).await {
            Ok(value) => {
                self.health.record_success(&entry.id);
                self.breakers.record_success(&entry.id);
                if let Some(observer) = &self.observer {
                    observer.on_success(&entry.id);
                }
                Ok(value)
            }
            Err(error) => {
                warn!(provider = %entry.id, %error, "Provider attempt failed");
                self.health.record_failure(&entry.id);
                self.breakers.record_failure(&entry.id);
                if let Some(observer) = &self.observer {
                    observer.on_failure(&entry.id, &error);
                }
                Err(error)
            }
        }
    }
}
