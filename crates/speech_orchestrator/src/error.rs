//! Orchestration errors
//!
//! Single-attempt failures are recovered locally by fallback and never reach
//! the caller; what surfaces here is either the terminal exhaustion of a
//! non-empty chain (with one entry per provider, in priority order) or the
//! absence of any provider to try.

use std::fmt;

use speech_core::SpeechError;
use thiserror::Error;

/// Why a provider was skipped without being called
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Health tracker reports the provider unhealthy
    Unhealthy,
    /// Circuit breaker is open for the provider
    CircuitOpen,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unhealthy => write!(f, "unhealthy"),
            Self::CircuitOpen => write!(f, "circuit open"),
        }
    }
}

/// What happened to one provider during fallback traversal
#[derive(Debug, Error)]
pub enum AttemptFailure {
    /// The provider was not called
    #[error("skipped ({0})")]
    Skipped(SkipReason),

    /// The provider was called and its attempt failed
    #[error(transparent)]
    Failed(SpeechError),
}

/// One entry of the exhaustion payload
#[derive(Debug)]
pub struct AttemptError {
    /// Provider that was attempted or skipped
    pub provider_id: String,
    /// Why no result was obtained from it
    pub failure: AttemptFailure,
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.provider_id, self.failure)
    }
}

/// Errors surfaced to callers of orchestrated operations
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The provider chain was empty; no attempt occurred
    #[error("No providers available")]
    NoProvidersAvailable,

    /// Every provider in a non-empty chain was attempted or skipped
    #[error("All providers exhausted after {} attempts", attempts.len())]
    AllProvidersExhausted {
        /// Per-provider outcomes in original priority order
        attempts: Vec<AttemptError>,
    },

    /// Direct propagation when fallback is disabled
    #[error(transparent)]
    Provider(#[from] SpeechError),
}

impl OrchestratorError {
    /// Returns true if no provider could produce a result
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::NoProvidersAvailable | Self::AllProvidersExhausted { .. }
        )
    }

    /// The per-provider outcomes, if this is an exhaustion error
    #[must_use]
    pub fn attempts(&self) -> Option<&[AttemptError]> {
        match self {
            Self::AllProvidersExhausted { attempts } => Some(attempts),
            Self::NoProvidersAvailable | Self::Provider(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_reason_display() {
        assert_eq!(SkipReason::Unhealthy.to_string(), "unhealthy");
        assert_eq!(SkipReason::CircuitOpen.to_string(), "circuit open");
    }

    #[test]
    fn attempt_error_display() {
        let attempt = AttemptError {
            provider_id: "whisper-local".to_string(),
            failure: AttemptFailure::Skipped(SkipReason::CircuitOpen),
        };
        assert_eq!(attempt.to_string(), "whisper-local: skipped (circuit open)");
    }

    #[test]
    fn failed_attempt_is_transparent() {
        let attempt = AttemptError {
            provider_id: "cloud".to_string(),
            failure: AttemptFailure::Failed(SpeechError::RequestFailed("503".to_string())),
        };
        assert_eq!(attempt.to_string(), "cloud: Request failed: 503");
    }

    #[test]
    fn exhausted_error_counts_attempts() {
        let err = OrchestratorError::AllProvidersExhausted {
            attempts: vec![
                AttemptError {
                    provider_id: "a".to_string(),
                    failure: AttemptFailure::Skipped(SkipReason::Unhealthy),
                },
                AttemptError {
                    provider_id: "b".to_string(),
                    failure: AttemptFailure::Failed(SpeechError::Timeout(5_000)),
                },
            ],
        };
        assert_eq!(err.to_string(), "All providers exhausted after 2 attempts");
        assert!(err.is_terminal());
        assert_eq!(err.attempts().map(<[AttemptError]>::len), Some(2));
    }

    #[test]
    fn no_providers_is_terminal_without_attempts() {
        let err = OrchestratorError::NoProvidersAvailable;
        assert!(err.is_terminal());
        assert!(err.attempts().is_none());
    }

    #[test]
    fn provider_error_is_not_terminal() {
        let err = OrchestratorError::from(SpeechError::Timeout(1_000));
        assert!(!err.is_terminal());
        assert_eq!(err.to_string(), "Speech processing timeout after 1000ms");
    }
}
