//! Provider adapters
//!
//! Concrete implementations of the speech ports, constructed by a factory
//! keyed on the configuration `type` tag. Adding a backend means adding a
//! `ProviderSettings` variant and a constructor arm, never subclassing.

pub mod http;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::HttpProviderConfig;
use crate::error::SpeechError;
use crate::ports::{SttProvider, TtsProvider};

pub use http::HttpSpeechProvider;

/// Provider-specific settings, tagged by backend type
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderSettings {
    /// OpenAI-compatible HTTP endpoint
    Http(HttpProviderConfig),
}

/// Build an STT provider from validated settings
///
/// # Errors
///
/// Returns `SpeechError::Configuration` if the settings are invalid.
pub fn build_stt(
    id: impl Into<String>,
    settings: &ProviderSettings,
) -> Result<Arc<dyn SttProvider>, SpeechError> {
    match settings {
        ProviderSettings::Http(config) => {
            Ok(Arc::new(HttpSpeechProvider::new(id, config.clone())?))
        },
    }
}

/// Build a TTS provider from validated settings
///
/// # Errors
///
/// Returns `SpeechError::Configuration` if the settings are invalid.
pub fn build_tts(
    id: impl Into<String>,
    settings: &ProviderSettings,
) -> Result<Arc<dyn TtsProvider>, SpeechError> {
    match settings {
        ProviderSettings::Http(config) => {
            Ok(Arc::new(HttpSpeechProvider::new(id, config.clone())?))
        },
    }
}
