//! Speech processing errors

use thiserror::Error;

/// Errors that can occur during speech processing
#[derive(Debug, Error)]
pub enum SpeechError {
    /// Invalid configuration; fatal at load, the provider is excluded
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Failed to connect to a speech service or open a streaming channel
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Request to a speech service failed
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// Invalid audio format or corrupted data
    #[error("Invalid audio: {0}")]
    InvalidAudio(String),

    /// Transcription failed
    #[error("Transcription failed: {0}")]
    TranscriptionFailed(String),

    /// Synthesis failed
    #[error("Synthesis failed: {0}")]
    SynthesisFailed(String),

    /// Invalid response from a service
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Timeout during a single-shot operation
    #[error("Speech processing timeout after {0}ms")]
    Timeout(u64),

    /// Provider not available (not installed or configured)
    #[error("Provider not available: {0}")]
    NotAvailable(String),

    /// No output chunk arrived within the idle window of a stream
    #[error("Stream stalled: no chunk within {0}ms")]
    StreamTimeout(u64),

    /// Malformed or semantically invalid message on a streaming channel
    #[error("Stream protocol violation: {0}")]
    StreamProtocol(String),

    /// Provider does not implement streaming operations
    #[error("Provider '{0}' does not support streaming")]
    StreamingUnsupported(String),
}

impl From<reqwest::Error> for SpeechError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(30_000)
        } else if err.is_connect() {
            Self::ConnectionFailed(err.to_string())
        } else {
            Self::RequestFailed(err.to_string())
        }
    }
}
