//! Types for speech processing
//!
//! Carrier types for audio data, transcriptions, stream chunks, and the
//! provider descriptors the orchestrator builds its fallback chains from.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Supported audio formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    /// WAV format (uncompressed)
    Wav,
    /// MP3 format
    Mp3,
    /// Opus codec
    Opus,
    /// FLAC format (lossless)
    Flac,
    /// Raw PCM samples (16-bit little-endian)
    Pcm,
}

impl AudioFormat {
    /// Get the MIME type for this audio format
    #[must_use]
    pub const fn mime_type(&self) -> &'static str {
        match self {
            Self::Wav => "audio/wav",
            Self::Mp3 => "audio/mpeg",
            Self::Opus => "audio/opus",
            Self::Flac => "audio/flac",
            Self::Pcm => "audio/l16",
        }
    }

    /// Get the file extension for this audio format
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Mp3 => "mp3",
            Self::Opus => "opus",
            Self::Flac => "flac",
            Self::Pcm => "pcm",
        }
    }
}

/// Container for audio data with metadata
#[derive(Debug, Clone)]
pub struct AudioData {
    /// Raw audio bytes
    data: Vec<u8>,
    /// Audio format
    format: AudioFormat,
    /// Duration in milliseconds (if known)
    duration_ms: Option<u64>,
    /// Sample rate in Hz (if known)
    sample_rate: Option<u32>,
}

impl AudioData {
    /// Create new audio data
    #[must_use]
    pub const fn new(data: Vec<u8>, format: AudioFormat) -> Self {
        Self {
            data,
            format,
            duration_ms: None,
            sample_rate: None,
        }
    }

    /// Attach a known duration
    #[must_use]
    pub const fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Attach a known sample rate
    #[must_use]
    pub const fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = Some(sample_rate);
        self
    }

    /// Get the raw audio bytes
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consume and return the raw audio bytes
    #[must_use]
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Get the audio format
    #[must_use]
    pub const fn format(&self) -> AudioFormat {
        self.format
    }

    /// Get the duration in milliseconds (if known)
    #[must_use]
    pub const fn duration_ms(&self) -> Option<u64> {
        self.duration_ms
    }

    /// Get the sample rate (if known)
    #[must_use]
    pub const fn sample_rate(&self) -> Option<u32> {
        self.sample_rate
    }

    /// Get the size of the audio data in bytes
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }

    /// Check if the audio data is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Generate a filename with the appropriate extension
    #[must_use]
    pub fn filename(&self, base: &str) -> String {
        format!("{}.{}", base, self.format.extension())
    }
}

/// Result of speech-to-text transcription
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcription {
    /// Transcribed text
    pub text: String,
    /// Detected language (ISO 639-1 code)
    pub language: Option<String>,
    /// Confidence score (0.0 - 1.0)
    pub confidence: Option<f32>,
    /// Duration of the audio in milliseconds
    pub duration_ms: Option<u64>,
}

impl Transcription {
    /// Create a new transcription with just text
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            language: None,
            confidence: None,
            duration_ms: None,
        }
    }

    /// Attach a detected language
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Attach a confidence score
    #[must_use]
    pub const fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Attach the audio duration
    #[must_use]
    pub const fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }
}

/// Information about an available TTS voice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceInfo {
    /// Voice identifier used in synthesis requests
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Language of the voice (ISO 639-1 code)
    pub language: Option<String>,
    /// Optional description
    pub description: Option<String>,
}

impl VoiceInfo {
    /// Create a new voice info entry
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            language: None,
            description: None,
        }
    }

    /// Attach a language code
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

/// A chunk of a streaming operation's output
///
/// Sequence numbers establish delivery order; the pipeline delivers chunks
/// strictly in the order the channel produced them and rejects regressions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamChunk<P> {
    /// Monotonically increasing position in the stream
    pub sequence: u64,
    /// Chunk payload (text delta or audio bytes)
    pub payload: P,
    /// Whether this chunk marks logical stream end
    pub is_final: bool,
}

impl<P> StreamChunk<P> {
    /// Create a non-final chunk
    pub const fn new(sequence: u64, payload: P) -> Self {
        Self {
            sequence,
            payload,
            is_final: false,
        }
    }

    /// Create a final chunk
    pub const fn final_chunk(sequence: u64, payload: P) -> Self {
        Self {
            sequence,
            payload,
            is_final: true,
        }
    }
}

/// Chunk of a streaming transcription
pub type TranscriptChunk = StreamChunk<String>;

/// Chunk of streaming synthesized audio
pub type AudioChunk = StreamChunk<Bytes>;

/// Kind of speech provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Speech-to-text
    Stt,
    /// Text-to-speech
    Tts,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stt => write!(f, "stt"),
            Self::Tts => write!(f, "tts"),
        }
    }
}

/// Descriptor for a registered provider
///
/// Immutable after registry load. Chain order is a total order by priority,
/// ties broken by registration order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    /// Unique provider identifier
    pub id: String,
    /// Whether this is an STT or TTS provider
    pub kind: ProviderKind,
    /// Chain position; lower values are tried first
    #[serde(default)]
    pub priority: u32,
    /// Disabled providers are excluded at registry load
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

const fn default_enabled() -> bool {
    true
}

impl ProviderDescriptor {
    /// Create an enabled descriptor
    pub fn new(id: impl Into<String>, kind: ProviderKind, priority: u32) -> Self {
        Self {
            id: id.into(),
            kind,
            priority,
            enabled: true,
        }
    }
}

/// Capabilities advertised by a provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderCapabilities {
    /// Audio formats the provider accepts or produces
    pub supported_formats: Vec<AudioFormat>,
    /// Sample rates in Hz
    pub supported_sample_rates: Vec<u32>,
    /// ISO 639-1 language codes
    pub supported_languages: Vec<String>,
    /// Whether streaming operations are implemented
    pub supports_streaming: bool,
    /// Maximum concurrent streaming sessions (None = unbounded)
    pub max_concurrent_sessions: Option<u32>,
    /// Rough expected latency for a single-shot call
    pub estimated_latency_ms: Option<u64>,
    /// Whether the provider needs network access
    pub requires_network: bool,
    /// Whether the provider needs a locally installed model
    pub requires_local_model: bool,
}

impl Default for ProviderCapabilities {
    fn default() -> Self {
        Self {
            supported_formats: vec![AudioFormat::Wav],
            supported_sample_rates: vec![16_000],
            supported_languages: vec!["en".to_string()],
            supports_streaming: false,
            max_concurrent_sessions: None,
            estimated_latency_ms: None,
            requires_network: false,
            requires_local_model: false,
        }
    }
}

/// Options for a transcription request
#[derive(Debug, Clone, Default)]
pub struct TranscribeOptions {
    /// Language hint (ISO 639-1 code)
    pub language: Option<String>,
    /// Sample rate of the input audio, if the payload does not carry it
    pub sample_rate: Option<u32>,
}

impl TranscribeOptions {
    /// Set a language hint
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

/// Options for a synthesis request
#[derive(Debug, Clone, Default)]
pub struct SynthesizeOptions {
    /// Voice to use (provider default if None)
    pub voice: Option<String>,
    /// Desired output format (provider default if None)
    pub format: Option<AudioFormat>,
    /// Desired output sample rate
    pub sample_rate: Option<u32>,
}

impl SynthesizeOptions {
    /// Set the voice
    #[must_use]
    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = Some(voice.into());
        self
    }

    /// Set the output format
    #[must_use]
    pub const fn with_format(mut self, format: AudioFormat) -> Self {
        self.format = Some(format);
        self
    }
}
