//! Configuration for the speech orchestrator and its provider adapters
//!
//! All structs deserialize from TOML/JSON with sensible defaults, so a
//! partial configuration file only has to name what it overrides.

use serde::{Deserialize, Serialize};

use crate::error::SpeechError;
use crate::types::AudioFormat;

/// Top-level orchestrator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Whether fallback traversal past the first provider is allowed
    #[serde(default = "default_allow_fallback")]
    pub allow_fallback: bool,

    /// Circuit breaker tuning
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,

    /// Health tracking and probing tuning
    #[serde(default)]
    pub health: HealthConfig,

    /// Streaming pipeline tuning
    #[serde(default)]
    pub stream: StreamConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            allow_fallback: default_allow_fallback(),
            circuit_breaker: CircuitBreakerConfig::default(),
            health: HealthConfig::default(),
            stream: StreamConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns `SpeechError::Configuration` if any section is invalid.
    pub fn validate(&self) -> Result<(), SpeechError> {
        self.circuit_breaker.validate()?;
        self.health.validate()?;
        self.stream.validate()
    }
}

/// Per-provider circuit breaker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive domain failures before the circuit opens
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Time in milliseconds after which an open circuit permits one
    /// exploratory call
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            cooldown_ms: default_cooldown_ms(),
        }
    }
}

impl CircuitBreakerConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), SpeechError> {
        if self.failure_threshold == 0 {
            return Err(SpeechError::Configuration(
                "circuit breaker failure_threshold must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Health tracking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Consecutive failures before a provider is marked unhealthy
    #[serde(default = "default_unhealthy_after")]
    pub unhealthy_after: u32,

    /// Interval between periodic health probes in milliseconds
    #[serde(default = "default_probe_interval_ms")]
    pub probe_interval_ms: u64,

    /// Per-probe timeout in milliseconds
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            unhealthy_after: default_unhealthy_after(),
            probe_interval_ms: default_probe_interval_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
        }
    }
}

impl HealthConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), SpeechError> {
        if self.unhealthy_after == 0 {
            return Err(SpeechError::Configuration(
                "health unhealthy_after must be greater than 0".to_string(),
            ));
        }
        if self.probe_interval_ms == 0 {
            return Err(SpeechError::Configuration(
                "health probe_interval_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Streaming pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Output buffer capacity in chunks; reaching it pauses the
    /// input-forwarder until the buffer drains to the low watermark
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,

    /// Channel handshake timeout in milliseconds
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Maximum time in milliseconds between delivered output chunks
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: default_buffer_capacity(),
            connect_timeout_ms: default_connect_timeout_ms(),
            idle_timeout_ms: default_idle_timeout_ms(),
        }
    }
}

impl StreamConfig {
    /// Buffer occupancy at which backpressure is released
    #[must_use]
    pub const fn low_watermark(&self) -> usize {
        let mark = self.buffer_capacity / 2;
        if mark == 0 { 1 } else { mark }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), SpeechError> {
        if self.buffer_capacity == 0 {
            return Err(SpeechError::Configuration(
                "stream buffer_capacity must be greater than 0".to_string(),
            ));
        }
        if self.idle_timeout_ms == 0 {
            return Err(SpeechError::Configuration(
                "stream idle_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.connect_timeout_ms == 0 {
            return Err(SpeechError::Configuration(
                "stream connect_timeout_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration for the OpenAI-compatible HTTP provider adapter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpProviderConfig {
    /// API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key, if the endpoint requires one
    #[serde(default)]
    pub api_key: Option<String>,

    /// Speech-to-text model
    #[serde(default = "default_stt_model")]
    pub stt_model: String,

    /// Text-to-speech model
    #[serde(default = "default_tts_model")]
    pub tts_model: String,

    /// Default voice for synthesis
    #[serde(default = "default_voice")]
    pub default_voice: String,

    /// Output audio format for synthesis
    #[serde(default = "default_output_format")]
    pub output_format: AudioFormat,

    /// Request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for HttpProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            stt_model: default_stt_model(),
            tts_model: default_tts_model(),
            default_voice: default_voice(),
            output_format: default_output_format(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl HttpProviderConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), SpeechError> {
        if self.base_url.is_empty() {
            return Err(SpeechError::Configuration(
                "base_url must not be empty".to_string(),
            ));
        }
        if self.timeout_ms == 0 {
            return Err(SpeechError::Configuration(
                "timeout_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

const fn default_allow_fallback() -> bool {
    true
}

const fn default_failure_threshold() -> u32 {
    3
}

const fn default_cooldown_ms() -> u64 {
    60_000 // 60 seconds
}

const fn default_unhealthy_after() -> u32 {
    2
}

const fn default_probe_interval_ms() -> u64 {
    30_000 // 30 seconds
}

const fn default_probe_timeout_ms() -> u64 {
    5_000
}

const fn default_buffer_capacity() -> usize {
    10
}

const fn default_connect_timeout_ms() -> u64 {
    5_000
}

const fn default_idle_timeout_ms() -> u64 {
    10_000
}

fn default_base_url() -> String {
    "http://localhost:8080/v1".to_string()
}

fn default_stt_model() -> String {
    "whisper-1".to_string()
}

fn default_tts_model() -> String {
    "tts-1".to_string()
}

fn default_voice() -> String {
    "alloy".to_string()
}

const fn default_output_format() -> AudioFormat {
    AudioFormat::Wav
}

const fn default_timeout_ms() -> u64 {
    30_000 // 30 seconds
}
