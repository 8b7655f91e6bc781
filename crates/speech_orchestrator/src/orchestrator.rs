//! Orchestrator facade
//!
//! Wires the registry, health tracker, circuit breakers and fallback
//! coordinator into the operation surface callers actually use, and owns the
//! periodic health-probe task.
//!
//! Streaming operations resolve their provider through the same fallback
//! traversal as single-shot calls, but only for the connect phase: once a
//! channel is open the pipeline is handed to the caller and mid-stream
//! errors surface directly, with no second provider attempt.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use speech_core::{
    AudioData, InputStream, OrchestratorConfig, SpeechError, SynthesizeOptions, TranscribeOptions,
    Transcription,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

use crate::breaker::CircuitBreakerBank;
use crate::coordinator::{AttemptObserver, FallbackCoordinator};
use crate::error::OrchestratorError;
use crate::health::HealthTracker;
use crate::pipeline::{race_handshake, StreamingPipeline};
use crate::registry::ProviderRegistry;

/// One provider's row in the health export
#[derive(Debug, Clone, Serialize)]
pub struct ProviderHealthStatus {
    /// Whether the provider is currently considered healthy
    pub healthy: bool,
    /// When the health record was last updated
    pub last_check: DateTime<Utc>,
    /// Failures since the last success
    pub consecutive_failures: u32,
    /// Whether the provider's circuit breaker is open
    pub circuit_breaker_open: bool,
}

struct ProbeHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Coordinates STT/TTS providers behind one uniform operation surface
pub struct SpeechOrchestrator {
    registry: Arc<ProviderRegistry>,
    health: Arc<HealthTracker>,
    breakers: Arc<CircuitBreakerBank>,
    coordinator: FallbackCoordinator,
    config: OrchestratorConfig,
    probe: Mutex<Option<ProbeHandle>>,
}

impl fmt::Debug for SpeechOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpeechOrchestrator")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .field("probe_running", &self.probe.lock().is_some())
            .finish_non_exhaustive()
    }
}

impl SpeechOrchestrator {
    /// Create an orchestrator over a loaded registry
    ///
    /// # Errors
    ///
    /// Returns `SpeechError::Configuration` if the configuration fails
    /// validation.
    pub fn new(
        registry: ProviderRegistry,
        config: OrchestratorConfig,
    ) -> Result<Self, SpeechError> {
        config.validate()?;

        let health = Arc::new(HealthTracker::new(&config.health));
        let breakers = Arc::new(CircuitBreakerBank::new(&config.circuit_breaker));
        let coordinator = FallbackCoordinator::new(Arc::clone(&health), Arc::clone(&breakers));

        Ok(Self {
            registry: Arc::new(registry),
            health,
            breakers,
            coordinator,
            config,
            probe: Mutex::new(None),
        })
    }

    /// Attach an attempt observer to the fallback traversal
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn AttemptObserver>) -> Self {
        self.coordinator = self.coordinator.with_observer(observer);
        self
    }

    /// Run provider initialization hooks
    pub async fn initialize(&self) {
        self.registry.initialize_all().await;
    }

    /// Transcribe a complete audio buffer through the STT fallback chain
    ///
    /// # Errors
    ///
    /// See [`FallbackCoordinator::execute`] for the error contract.
    #[instrument(skip(self, audio), fields(audio_bytes = audio.size_bytes()))]
    pub async fn transcribe(
        &self,
        audio: AudioData,
        options: &TranscribeOptions,
    ) -> Result<Transcription, OrchestratorError> {
        let chain = self.registry.stt_chain();
        self.coordinator
            .execute(&chain, self.config.allow_fallback, |entry| {
                let audio = audio.clone();
                async move { entry.provider.transcribe(audio, options).await }
            })
            .await
    }

    /// Synthesize a complete text through the TTS fallback chain
    ///
    /// # Errors
    ///
    /// See [`FallbackCoordinator::execute`] for the error contract.
    #[instrument(skip(self, text), fields(text_chars = text.len()))]
    pub async fn synthesize(
        &self,
        text: &str,
        options: &SynthesizeOptions,
    ) -> Result<AudioData, OrchestratorError> {
        let chain = self.registry.tts_chain();
        self.coordinator
            .execute(&chain, self.config.allow_fallback, |entry| async move {
                entry.provider.synthesize(text, options).await
            })
            .await
    }

    /// Open a streaming transcription pipeline
    ///
    /// Providers that do not support streaming are not part of the chain for
    /// this call. Each attempt races the provider's channel handshake against
    /// the connect timeout; the input stream is only attached once a channel
    /// is open, so failed attempts never consume input.
    ///
    /// # Errors
    ///
    /// See [`FallbackCoordinator::execute`] for the error contract.
    #[instrument(skip(self, input))]
    pub async fn transcribe_stream(
        &self,
        input: InputStream<Bytes>,
        options: &TranscribeOptions,
    ) -> Result<StreamingPipeline<String>, OrchestratorError> {
        let chain: Vec<_> = self
            .registry
            .stt_chain()
            .iter()
            .filter(|entry| entry.provider.capabilities().supports_streaming)
            .map(Arc::clone)
            .collect();
        let stream_config = &self.config.stream;

        let handles = self
            .coordinator
            .execute(&chain, self.config.allow_fallback, |entry| async move {
                race_handshake(entry.provider.open_transcribe_stream(options), stream_config).await
            })
            .await?;

        Ok(StreamingPipeline::from_handles(handles, input, stream_config))
    }

    /// Open a streaming synthesis pipeline
    ///
    /// Same connect-phase fallback semantics as
    /// [`Self::transcribe_stream`].
    ///
    /// # Errors
    ///
    /// See [`FallbackCoordinator::execute`] for the error contract.
    #[instrument(skip(self, input))]
    pub async fn synthesize_stream(
        &self,
        input: InputStream<String>,
        options: &SynthesizeOptions,
    ) -> Result<StreamingPipeline<Bytes>, OrchestratorError> {
        let chain: Vec<_> = self
            .registry
            .tts_chain()
            .iter()
            .filter(|entry| entry.provider.capabilities().supports_streaming)
            .map(Arc::clone)
            .collect();
        let stream_config = &self.config.stream;

        let handles = self
            .coordinator
            .execute(&chain, self.config.allow_fallback, |entry| async move {
                race_handshake(entry.provider.open_synthesize_stream(options), stream_config).await
            })
            .await?;

        Ok(StreamingPipeline::from_handles(handles, input, stream_config))
    }

    /// Move an STT provider to the front of its chain
    ///
    /// # Errors
    ///
    /// Returns `SpeechError::NotAvailable` for unknown ids.
    pub fn promote_stt(&self, provider_id: &str) -> Result<(), SpeechError> {
        self.registry.promote_stt(provider_id)
    }

    /// Move a TTS provider to the front of its chain
    ///
    /// # Errors
    ///
    /// Returns `SpeechError::NotAvailable` for unknown ids.
    pub fn promote_tts(&self, provider_id: &str) -> Result<(), SpeechError> {
        self.registry.promote_tts(provider_id)
    }

    /// Health export for monitoring, one row per registered provider
    ///
    /// Providers without traffic or probe results yet report their healthy
    /// default.
    #[must_use]
    pub fn health_status(&self) -> HashMap<String, ProviderHealthStatus> {
        let mut status = HashMap::new();
        let stt = self.registry.stt_chain();
        let tts = self.registry.tts_chain();
        let ids = stt
            .iter()
            .map(|entry| entry.id.clone())
            .chain(tts.iter().map(|entry| entry.id.clone()));

        for id in ids {
            let record = self.health.record(&id).unwrap_or_default();
            status.insert(
                id.clone(),
                ProviderHealthStatus {
                    healthy: record.healthy,
                    last_check: record.last_check,
                    consecutive_failures: record.consecutive_failures,
                    circuit_breaker_open: self.breakers.is_open(&id),
                },
            );
        }

        status
    }

    /// Start the periodic health-probe task
    ///
    /// Each tick polls every registered provider's `is_healthy` capability
    /// and feeds the result through the same success/failure path as live
    /// traffic. Idempotent; a second call while running is a no-op.
    pub fn start_health_probe(&self) {
        let mut guard = self.probe.lock();
        if guard.is_some() {
            return;
        }

        let (stop, mut stop_rx) = watch::channel(false);
        let registry = Arc::clone(&self.registry);
        let health = Arc::clone(&self.health);
        let interval = Duration::from_millis(self.config.health.probe_interval_ms);
        let probe_timeout = Duration::from_millis(self.config.health.probe_timeout_ms);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                let stopped = tokio::select! {
                    _ = stop_rx.wait_for(|stopped| *stopped) => true,
                    _ = ticker.tick() => false,
                };
                if stopped {
                    break;
                }
                probe_all(&registry, &health, probe_timeout).await;
            }
            debug!("Health probe stopped");
        });

        info!(
            interval_ms = self.config.health.probe_interval_ms,
            "Health probe started"
        );
        *guard = Some(ProbeHandle { stop, task });
    }

    /// Stop the probe, run provider shutdown hooks and clear all state
    pub async fn shutdown(&self) {
        let probe = self.probe.lock().take();
        if let Some(probe) = probe {
            let _ = probe.stop.send(true);
            let _ = probe.task.await;
        }

        self.registry.shutdown_all().await;
        self.health.clear();
        self.breakers.clear();
        info!("Orchestrator shut down");
    }
}

/// One probe round over both chains
async fn probe_all(registry: &ProviderRegistry, health: &HealthTracker, probe_timeout: Duration) {
    for entry in registry.stt_chain().iter() {
        let healthy = tokio::time::timeout(probe_timeout, entry.provider.is_healthy())
            .await
            .unwrap_or(false);
        if healthy {
            health.record_success(&entry.id);
        } else {
            health.record_failure(&entry.id);
        }
    }
    for entry in registry.tts_chain().iter() {
        let healthy = tokio::time::timeout(probe_timeout, entry.provider.is_healthy())
            .await
            .unwrap_or(false);
        if healthy {
            health.record_success(&entry.id);
        } else {
            health.record_failure(&entry.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use speech_core::{
        AudioFormat, ChannelEvent, DuplexHandles, ProviderCapabilities, ProviderDescriptor,
        ProviderKind, StreamChunk, StreamSink, StreamSource, SttProvider, TtsProvider,
    };
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::mpsc;

    struct ScriptedStt {
        name: String,
        fail: bool,
        healthy: bool,
        streaming: bool,
        calls: AtomicU32,
    }

    impl ScriptedStt {
        fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                fail: false,
                healthy: true,
                streaming: false,
                calls: AtomicU32::new(0),
            }
        }

        fn failing(name: &str) -> Self {
            Self {
                fail: true,
                ..Self::new(name)
            }
        }
    }

    #[async_trait]
    impl SttProvider for ScriptedStt {
        fn capabilities(&self) -> ProviderCapabilities {
            ProviderCapabilities {
                supports_streaming: self.streaming,
                ..ProviderCapabilities::default()
            }
        }

        async fn transcribe(
            &self,
            _audio: AudioData,
            _options: &TranscribeOptions,
        ) -> Result<Transcription, SpeechError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(SpeechError::TranscriptionFailed("scripted".to_string()))
            } else {
                Ok(Transcription::new(format!("text from {}", self.name)))
            }
        }

        async fn open_transcribe_stream(
            &self,
            _options: &TranscribeOptions,
        ) -> Result<DuplexHandles<Bytes, String>, SpeechError> {
            if self.fail {
                return Err(SpeechError::ConnectionFailed("scripted".to_string()));
            }

            let (events_tx, events_rx) = mpsc::unbounded_channel();
            events_tx
                .send(ChannelEvent::Chunk(StreamChunk::final_chunk(
                    1,
                    format!("stream from {}", self.name),
                )))
                .ok();

            struct NullSink;
            #[async_trait]
            impl StreamSink<Bytes> for NullSink {
                async fn send(&mut self, _item: Bytes) -> Result<(), SpeechError> {
                    Ok(())
                }
                async fn finish(&mut self) -> Result<(), SpeechError> {
                    Ok(())
                }
                async fn close(&mut self) {}
            }

            struct ScriptSource {
                events: mpsc::UnboundedReceiver<ChannelEvent<String>>,
                _keep_alive: mpsc::UnboundedSender<ChannelEvent<String>>,
            }
            #[async_trait]
            impl StreamSource<String> for ScriptSource {
                async fn next_event(&mut self) -> Option<ChannelEvent<String>> {
                    self.events.recv().await
                }
            }

            Ok((
                Box::new(NullSink),
                Box::new(ScriptSource {
                    events: events_rx,
                    _keep_alive: events_tx,
                }),
            ))
        }

        async fn is_healthy(&self) -> bool {
            self.healthy
        }

        fn name(&self) -> &str {
            &self.name
        }
    }

    struct ScriptedTts;

    #[async_trait]
    impl TtsProvider for ScriptedTts {
        fn capabilities(&self) -> ProviderCapabilities {
            ProviderCapabilities::default()
        }

        async fn synthesize(
            &self,
            _text: &str,
            _options: &SynthesizeOptions,
        ) -> Result<AudioData, SpeechError> {
            Ok(AudioData::new(vec![1, 2, 3], AudioFormat::Wav))
        }

        async fn is_healthy(&self) -> bool {
            true
        }

        fn name(&self) -> &str {
            "scripted-tts"
        }

        fn default_voice(&self) -> &str {
            "alloy"
        }
    }

    fn orchestrator_with(providers: Vec<(&str, Arc<ScriptedStt>)>) -> SpeechOrchestrator {
        let stt = providers
            .into_iter()
            .enumerate()
            .map(|(index, (id, provider))| {
                (
                    ProviderDescriptor::new(id, ProviderKind::Stt, u32::try_from(index).unwrap()),
                    provider as Arc<dyn SttProvider>,
                )
            })
            .collect();
        let registry = ProviderRegistry::new(stt, Vec::new()).unwrap();
        SpeechOrchestrator::new(registry, OrchestratorConfig::default()).unwrap()
    }

    fn audio() -> AudioData {
        AudioData::new(vec![0; 16], AudioFormat::Wav)
    }

    #[tokio::test]
    async fn transcribe_uses_first_provider() {
        let a = Arc::new(ScriptedStt::new("a"));
        let b = Arc::new(ScriptedStt::new("b"));
        let orchestrator =
            orchestrator_with(vec![("a", Arc::clone(&a)), ("b", Arc::clone(&b))]);

        let result = orchestrator
            .transcribe(audio(), &TranscribeOptions::default())
            .await
            .unwrap();

        assert_eq!(result.text, "text from a");
        assert_eq!(a.calls.load(Ordering::SeqCst), 1);
        assert_eq!(b.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn transcribe_falls_back_on_failure() {
        let a = Arc::new(ScriptedStt::failing("a"));
        let b = Arc::new(ScriptedStt::new("b"));
        let orchestrator =
            orchestrator_with(vec![("a", Arc::clone(&a)), ("b", Arc::clone(&b))]);

        let result = orchestrator
            .transcribe(audio(), &TranscribeOptions::default())
            .await
            .unwrap();

        assert_eq!(result.text, "text from b");
        assert_eq!(a.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn synthesize_goes_through_tts_chain() {
        let tts: Vec<(ProviderDescriptor, Arc<dyn TtsProvider>)> = vec![(
            ProviderDescriptor::new("voice", ProviderKind::Tts, 0),
            Arc::new(ScriptedTts),
        )];
        let registry = ProviderRegistry::new(Vec::new(), tts).unwrap();
        let orchestrator =
            SpeechOrchestrator::new(registry, OrchestratorConfig::default()).unwrap();

        let result = orchestrator
            .synthesize("hello", &SynthesizeOptions::default())
            .await
            .unwrap();
        assert!(!result.is_empty());
    }

    #[tokio::test]
    async fn promote_changes_first_provider() {
        let a = Arc::new(ScriptedStt::new("a"));
        let b = Arc::new(ScriptedStt::new("b"));
        let orchestrator =
            orchestrator_with(vec![("a", Arc::clone(&a)), ("b", Arc::clone(&b))]);

        orchestrator.promote_stt("b").unwrap();
        let result = orchestrator
            .transcribe(audio(), &TranscribeOptions::default())
            .await
            .unwrap();

        assert_eq!(result.text, "text from b");
        assert_eq!(a.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn health_status_reports_every_registered_provider() {
        let a = Arc::new(ScriptedStt::failing("a"));
        let b = Arc::new(ScriptedStt::new("b"));
        let orchestrator =
            orchestrator_with(vec![("a", Arc::clone(&a)), ("b", Arc::clone(&b))]);

        // Two failing calls flip a's record; b keeps serving.
        for _ in 0..2 {
            let _ = orchestrator
                .transcribe(audio(), &TranscribeOptions::default())
                .await;
        }

        let status = orchestrator.health_status();
        assert_eq!(status.len(), 2);
        assert!(!status["a"].healthy);
        assert_eq!(status["a"].consecutive_failures, 2);
        assert!(status["b"].healthy);
        assert!(!status["b"].circuit_breaker_open);
    }

    #[tokio::test]
    async fn streaming_skips_non_streaming_providers() {
        let a = Arc::new(ScriptedStt::new("a")); // no streaming support
        let b = Arc::new(ScriptedStt {
            streaming: true,
            ..ScriptedStt::new("b")
        });
        let orchestrator =
            orchestrator_with(vec![("a", Arc::clone(&a)), ("b", Arc::clone(&b))]);

        let input: InputStream<Bytes> = Box::pin(futures::stream::empty());
        let mut pipeline = orchestrator
            .transcribe_stream(input, &TranscribeOptions::default())
            .await
            .unwrap();

        let chunk = pipeline.next_chunk().await.unwrap().unwrap();
        assert_eq!(chunk.payload, "stream from b");

        // Lacking streaming support is not a health event for a.
        assert_eq!(orchestrator.health_status()["a"].consecutive_failures, 0);
    }

    #[tokio::test]
    async fn streaming_falls_back_on_connect_failure() {
        let a = Arc::new(ScriptedStt {
            streaming: true,
            ..ScriptedStt::failing("a")
        });
        let b = Arc::new(ScriptedStt {
            streaming: true,
            ..ScriptedStt::new("b")
        });
        let orchestrator =
            orchestrator_with(vec![("a", Arc::clone(&a)), ("b", Arc::clone(&b))]);

        let input: InputStream<Bytes> = Box::pin(futures::stream::empty());
        let mut pipeline = orchestrator
            .transcribe_stream(input, &TranscribeOptions::default())
            .await
            .unwrap();

        let chunk = pipeline.next_chunk().await.unwrap().unwrap();
        assert_eq!(chunk.payload, "stream from b");
        assert_eq!(orchestrator.health_status()["a"].consecutive_failures, 1);
    }

    #[tokio::test]
    async fn streaming_with_no_capable_provider_is_terminal() {
        let a = Arc::new(ScriptedStt::new("a"));
        let orchestrator = orchestrator_with(vec![("a", a)]);

        let input: InputStream<Bytes> = Box::pin(futures::stream::empty());
        let result = orchestrator
            .transcribe_stream(input, &TranscribeOptions::default())
            .await;

        assert!(matches!(
            result,
            Err(OrchestratorError::NoProvidersAvailable)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn probe_marks_unresponsive_provider_unhealthy() {
        let a = Arc::new(ScriptedStt {
            healthy: false,
            ..ScriptedStt::new("a")
        });
        let orchestrator = orchestrator_with(vec![("a", a)]);

        orchestrator.start_health_probe();
        // Two probe rounds push the record past the unhealthy threshold.
        tokio::time::sleep(Duration::from_millis(31_000)).await;

        assert!(!orchestrator.health_status()["a"].healthy);
        orchestrator.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_the_probe() {
        let a = Arc::new(ScriptedStt {
            healthy: false,
            ..ScriptedStt::new("a")
        });
        let orchestrator = orchestrator_with(vec![("a", a)]);

        orchestrator.start_health_probe();
        tokio::time::sleep(Duration::from_millis(100)).await;
        orchestrator.shutdown().await;

        // Shutdown cleared all records; a stopped probe does not repopulate.
        tokio::time::sleep(Duration::from_millis(61_000)).await;
        let status = orchestrator.health_status();
        assert_eq!(status["a"].consecutive_failures, 0);
    }

    #[tokio::test]
    async fn start_health_probe_is_idempotent() {
        let a = Arc::new(ScriptedStt::new("a"));
        let orchestrator = orchestrator_with(vec![("a", a)]);

        orchestrator.start_health_probe();
        orchestrator.start_health_probe();
        orchestrator.shutdown().await;
    }
}
