//! Speech Orchestrator - provider resilience and stream flow control
//!
//! Coordinates multiple interchangeable STT/TTS backends behind one uniform
//! operation surface:
//! - `ProviderRegistry` - priority-ordered provider chains, swapped atomically
//! - `HealthTracker` - consecutive success/failure accounting per provider
//! - `CircuitBreakerBank` - per-provider open/closed state with cooldown
//! - `FallbackCoordinator` - ordered traversal with stop-on-first-success
//! - `StreamingPipeline` - bounded-buffer duplex streaming with backpressure,
//!   idle-timeout detection and deterministic teardown
//! - `SpeechOrchestrator` - the facade wiring it all together, including the
//!   cancelable periodic health probe
//!
//! Providers are consumed purely through the `speech_core` ports and are
//! never aware of fallback or circuit-breaker state.
//!
//! # Example
//!
//! ```ignore
//! use speech_orchestrator::{ProviderRegistry, SpeechOrchestrator};
//!
//! let registry = ProviderRegistry::new(stt_entries, tts_entries)?;
//! let orchestrator = SpeechOrchestrator::new(registry, config)?;
//! orchestrator.start_health_probe();
//!
//! let transcription = orchestrator.transcribe(audio, &options).await?;
//! orchestrator.shutdown().await;
//! ```

pub mod breaker;
pub mod coordinator;
pub mod error;
pub mod health;
pub mod orchestrator;
pub mod pipeline;
pub mod registry;

pub use breaker::CircuitBreakerBank;
pub use coordinator::{AttemptObserver, FallbackCoordinator};
pub use error::{AttemptError, AttemptFailure, OrchestratorError, SkipReason};
pub use health::{HealthRecord, HealthTracker};
pub use orchestrator::{ProviderHealthStatus, SpeechOrchestrator};
pub use pipeline::{PipelineState, StreamingPipeline};
pub use registry::{ProviderEntry, ProviderRegistry, SttEntry, TtsEntry};
