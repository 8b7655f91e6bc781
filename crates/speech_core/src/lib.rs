//! Speech Core - provider abstractions for the speech orchestrator
//!
//! Defines the uniform operation surface that interchangeable STT and TTS
//! backends implement:
//! - `SttProvider` - transcribe audio to text, single-shot or streaming
//! - `TtsProvider` - synthesize speech from text, single-shot or streaming
//!
//! # Architecture
//!
//! This crate follows the ports & adapters pattern:
//! - `ports` module defines the traits (ports), including the duplex
//!   stream channel seam (`StreamSink` / `StreamSource`)
//! - `providers` module contains concrete implementations (adapters) and
//!   the configuration-keyed factory
//!
//! Fallback, circuit breaking, and health tracking live in the
//! `speech_orchestrator` crate; adapters here are never aware of them.
//!
//! # Example
//!
//! ```ignore
//! use speech_core::{HttpSpeechProvider, SttProvider, AudioData, AudioFormat};
//!
//! let provider = HttpSpeechProvider::new(config)?;
//! let audio = AudioData::new(bytes, AudioFormat::Wav);
//! let transcription = provider.transcribe(audio, &TranscribeOptions::default()).await?;
//! println!("Transcribed: {}", transcription.text);
//! ```

pub mod config;
pub mod error;
pub mod ports;
pub mod providers;
pub mod types;

pub use config::{
    CircuitBreakerConfig, HealthConfig, HttpProviderConfig, OrchestratorConfig, StreamConfig,
};
pub use error::SpeechError;
pub use ports::{
    ChannelEvent, DuplexHandles, InputStream, StreamSink, StreamSource, SttProvider, TtsProvider,
};
pub use providers::{build_stt, build_tts, HttpSpeechProvider, ProviderSettings};
pub use types::{
    AudioChunk, AudioData, AudioFormat, ProviderCapabilities, ProviderDescriptor, ProviderKind,
    StreamChunk, SynthesizeOptions, TranscribeOptions, TranscriptChunk, Transcription, VoiceInfo,
};
