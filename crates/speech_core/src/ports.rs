//! Port definitions for speech providers
//!
//! Defines the traits (ports) that provider adapters must implement, and the
//! duplex channel seam used by streaming operations. Adapters are consumed by
//! the orchestrator purely through these traits and are never aware of
//! fallback or circuit-breaker state.
//!
//! # Streaming seam
//!
//! A streaming operation opens a channel and hands back two halves: a
//! [`StreamSink`] the pipeline's input-forwarder writes into, and a
//! [`StreamSource`] the output-collector reads [`ChannelEvent`]s from.
//! Implementations may back the halves with WebSockets, OS processes, or
//! in-memory queues, as long as inbound events preserve arrival order.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

use crate::error::SpeechError;
use crate::types::{
    AudioData, ProviderCapabilities, StreamChunk, SynthesizeOptions, TranscribeOptions,
    Transcription, VoiceInfo,
};

/// An event arriving on the inbound half of a streaming channel
#[derive(Debug)]
pub enum ChannelEvent<O> {
    /// A decoded output chunk
    Chunk(StreamChunk<O>),
    /// An explicit error message from the channel
    Error(SpeechError),
    /// The remote side closed the channel
    Closed,
}

/// Outbound half of a streaming channel
#[async_trait]
pub trait StreamSink<I>: Send {
    /// Forward one input item to the channel
    async fn send(&mut self, item: I) -> Result<(), SpeechError>;

    /// Signal end-of-input to the channel
    async fn finish(&mut self) -> Result<(), SpeechError>;

    /// Abort the channel, releasing any transport resources
    async fn close(&mut self);
}

/// Inbound half of a streaming channel
#[async_trait]
pub trait StreamSource<O>: Send {
    /// Receive the next channel event
    ///
    /// Returns `None` once the channel is exhausted; an abrupt transport
    /// close without a prior [`ChannelEvent::Closed`] is treated the same.
    async fn next_event(&mut self) -> Option<ChannelEvent<O>>;
}

/// Both halves of an opened streaming channel
pub type DuplexHandles<I, O> = (Box<dyn StreamSink<I>>, Box<dyn StreamSource<O>>);

/// Lazy input sequence for a streaming operation
pub type InputStream<I> = Pin<Box<dyn Stream<Item = I> + Send>>;

/// Port for Speech-to-Text (STT) implementations
#[async_trait]
pub trait SttProvider: Send + Sync {
    /// One-time setup, called by the registry before first use
    async fn initialize(&self) -> Result<(), SpeechError> {
        Ok(())
    }

    /// Release resources, called once at orchestrator shutdown
    async fn shutdown(&self) -> Result<(), SpeechError> {
        Ok(())
    }

    /// Capabilities advertised by this provider
    fn capabilities(&self) -> ProviderCapabilities;

    /// Transcribe a complete audio buffer to text
    ///
    /// # Errors
    ///
    /// Returns `SpeechError` if transcription fails.
    async fn transcribe(
        &self,
        audio: AudioData,
        options: &TranscribeOptions,
    ) -> Result<Transcription, SpeechError>;

    /// Open a bidirectional transcription channel
    ///
    /// Audio bytes go in, transcript text chunks come out. The handshake
    /// (transport connect plus session init) completes before this returns.
    ///
    /// # Errors
    ///
    /// Returns `SpeechError::StreamingUnsupported` unless overridden, or
    /// `SpeechError::ConnectionFailed` if the handshake fails.
    async fn open_transcribe_stream(
        &self,
        _options: &TranscribeOptions,
    ) -> Result<DuplexHandles<Bytes, String>, SpeechError> {
        Err(SpeechError::StreamingUnsupported(self.name().to_string()))
    }

    /// Check if the provider is ready to process requests
    async fn is_healthy(&self) -> bool;

    /// Stable name of this provider instance
    fn name(&self) -> &str;
}

/// Port for Text-to-Speech (TTS) implementations
#[async_trait]
pub trait TtsProvider: Send + Sync {
    /// One-time setup, called by the registry before first use
    async fn initialize(&self) -> Result<(), SpeechError> {
        Ok(())
    }

    /// Release resources, called once at orchestrator shutdown
    async fn shutdown(&self) -> Result<(), SpeechError> {
        Ok(())
    }

    /// Capabilities advertised by this provider
    fn capabilities(&self) -> ProviderCapabilities;

    /// Synthesize a complete text into an audio buffer
    ///
    /// # Errors
    ///
    /// Returns `SpeechError` if synthesis fails.
    async fn synthesize(
        &self,
        text: &str,
        options: &SynthesizeOptions,
    ) -> Result<AudioData, SpeechError>;

    /// Open a bidirectional synthesis channel
    ///
    /// Text chunks go in, audio byte chunks come out.
    ///
    /// # Errors
    ///
    /// Returns `SpeechError::StreamingUnsupported` unless overridden, or
    /// `SpeechError::ConnectionFailed` if the handshake fails.
    async fn open_synthesize_stream(
        &self,
        _options: &SynthesizeOptions,
    ) -> Result<DuplexHandles<String, Bytes>, SpeechError> {
        Err(SpeechError::StreamingUnsupported(self.name().to_string()))
    }

    /// List available voices
    async fn list_voices(&self) -> Result<Vec<VoiceInfo>, SpeechError> {
        Ok(Vec::new())
    }

    /// Check if the provider is ready to process requests
    async fn is_healthy(&self) -> bool;

    /// Stable name of this provider instance
    fn name(&self) -> &str;

    /// Default voice identifier
    fn default_voice(&self) -> &str;
}
