//! OpenAI-compatible HTTP speech provider
//!
//! Implements `SttProvider` against `/audio/transcriptions` (multipart) and
//! `TtsProvider` against `/audio/speech` (JSON), which a number of local
//! inference servers expose in addition to the hosted API. Single-shot only;
//! `supports_streaming` is false, so the orchestrator skips this adapter for
//! streaming operations.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::config::HttpProviderConfig;
use crate::error::SpeechError;
use crate::ports::{SttProvider, TtsProvider};
use crate::types::{
    AudioData, AudioFormat, ProviderCapabilities, SynthesizeOptions, TranscribeOptions,
    Transcription, VoiceInfo,
};

/// HTTP speech provider implementing both STT and TTS
#[derive(Debug, Clone)]
pub struct HttpSpeechProvider {
    name: String,
    client: Client,
    config: HttpProviderConfig,
}

/// Transcription response body
#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
}

/// Synthesis request body
#[derive(Debug, Serialize)]
struct SynthesisRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'a str,
}

impl HttpSpeechProvider {
    /// Create a new HTTP speech provider
    ///
    /// # Errors
    ///
    /// Returns `SpeechError::Configuration` if the configuration is invalid
    /// or the HTTP client cannot be built.
    pub fn new(name: impl Into<String>, config: HttpProviderConfig) -> Result<Self, SpeechError> {
        config.validate()?;

        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| {
                SpeechError::Configuration(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self {
            name: name.into(),
            client,
            config,
        })
    }

    fn stt_url(&self) -> String {
        format!("{}/audio/transcriptions", self.config.base_url)
    }

    fn tts_url(&self) -> String {
        format!("{}/audio/speech", self.config.base_url)
    }

    fn models_url(&self) -> String {
        format!("{}/models", self.config.base_url)
    }

    /// Response format string for the synthesis endpoint
    const fn response_format(format: AudioFormat) -> &'static str {
        match format {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Opus => "opus",
            AudioFormat::Flac => "flac",
            AudioFormat::Wav => "wav",
            AudioFormat::Pcm => "pcm",
        }
    }

    fn apply_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.config.api_key.as_deref() {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

#[async_trait]
impl SttProvider for HttpSpeechProvider {
    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            supported_formats: vec![AudioFormat::Wav, AudioFormat::Mp3, AudioFormat::Flac],
            supported_sample_rates: vec![16_000, 24_000, 48_000],
            supported_languages: vec!["en".to_string(), "de".to_string(), "es".to_string()],
            supports_streaming: false,
            max_concurrent_sessions: None,
            estimated_latency_ms: Some(1_500),
            requires_network: true,
            requires_local_model: false,
        }
    }

    #[instrument(skip(self, audio), fields(provider = %self.name, audio_size = audio.size_bytes()))]
    async fn transcribe(
        &self,
        audio: AudioData,
        options: &TranscribeOptions,
    ) -> Result<Transcription, SpeechError> {
        if audio.is_empty() {
            return Err(SpeechError::InvalidAudio("Audio data is empty".to_string()));
        }

        let filename = audio.filename("audio");
        let mime_type = audio.format().mime_type();
        let data = audio.into_data();

        let file_part = Part::bytes(data)
            .file_name(filename)
            .mime_str(mime_type)
            .map_err(|e| SpeechError::InvalidAudio(format!("Invalid MIME type: {e}")))?;

        let mut form = Form::new()
            .part("file", file_part)
            .text("model", self.config.stt_model.clone());

        if let Some(ref language) = options.language {
            form = form.text("language", language.clone());
        }

        let response = self
            .apply_auth(self.client.post(self.stt_url()))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SpeechError::TranscriptionFailed(format!(
                "HTTP {status}: {body}"
            )));
        }

        let parsed: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| SpeechError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        debug!(text_len = parsed.text.len(), "Transcription complete");

        let mut transcription = Transcription::new(parsed.text);
        if let Some(lang) = parsed.language.or_else(|| options.language.clone()) {
            transcription = transcription.with_language(lang);
        }
        if let Some(duration) = parsed.duration {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let duration_ms = (duration * 1000.0) as u64;
            transcription = transcription.with_duration(duration_ms);
        }

        Ok(transcription)
    }

    async fn is_healthy(&self) -> bool {
        match self
            .apply_auth(self.client.get(self.models_url()))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl TtsProvider for HttpSpeechProvider {
    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            supported_formats: vec![
                AudioFormat::Mp3,
                AudioFormat::Opus,
                AudioFormat::Wav,
                AudioFormat::Pcm,
            ],
            supported_sample_rates: vec![24_000],
            supported_languages: vec!["en".to_string(), "de".to_string(), "es".to_string()],
            supports_streaming: false,
            max_concurrent_sessions: None,
            estimated_latency_ms: Some(2_000),
            requires_network: true,
            requires_local_model: false,
        }
    }

    #[instrument(skip(self, text), fields(provider = %self.name, text_len = text.len()))]
    async fn synthesize(
        &self,
        text: &str,
        options: &SynthesizeOptions,
    ) -> Result<AudioData, SpeechError> {
        if text.is_empty() {
            return Err(SpeechError::SynthesisFailed("Text is empty".to_string()));
        }

        let format = options.format.unwrap_or(self.config.output_format);
        let voice = options
            .voice
            .as_deref()
            .unwrap_or(&self.config.default_voice);

        let body = SynthesisRequest {
            model: &self.config.tts_model,
            input: text,
            voice,
            response_format: Self::response_format(format),
        };

        let response = self
            .apply_auth(self.client.post(self.tts_url()))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SpeechError::SynthesisFailed(format!(
                "HTTP {status}: {body}"
            )));
        }

        let data = response.bytes().await?;
        if data.is_empty() {
            return Err(SpeechError::InvalidResponse(
                "Synthesis returned empty audio".to_string(),
            ));
        }

        debug!(audio_size = data.len(), "Synthesis complete");
        Ok(AudioData::new(data.to_vec(), format))
    }

    async fn list_voices(&self) -> Result<Vec<VoiceInfo>, SpeechError> {
        // The speech endpoint has a fixed voice set; no listing API exists.
        Ok(vec![
            VoiceInfo::new("alloy", "Alloy"),
            VoiceInfo::new("echo", "Echo"),
            VoiceInfo::new("nova", "Nova"),
        ])
    }

    async fn is_healthy(&self) -> bool {
        SttProvider::is_healthy(self).await
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn default_voice(&self) -> &str {
        &self.config.default_voice
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> HttpSpeechProvider {
        HttpSpeechProvider::new("cloud", HttpProviderConfig::default()).unwrap()
    }

    #[test]
    fn builds_endpoint_urls() {
        let p = provider();
        assert_eq!(
            p.stt_url(),
            "http://localhost:8080/v1/audio/transcriptions"
        );
        assert_eq!(p.tts_url(), "http://localhost:8080/v1/audio/speech");
        assert_eq!(p.models_url(), "http://localhost:8080/v1/models");
    }

    #[test]
    fn response_format_mapping() {
        assert_eq!(HttpSpeechProvider::response_format(AudioFormat::Mp3), "mp3");
        assert_eq!(
            HttpSpeechProvider::response_format(AudioFormat::Opus),
            "opus"
        );
        assert_eq!(HttpSpeechProvider::response_format(AudioFormat::Pcm), "pcm");
    }

    #[test]
    fn rejects_invalid_config() {
        let config = HttpProviderConfig {
            timeout_ms: 0,
            ..Default::default()
        };
        assert!(HttpSpeechProvider::new("bad", config).is_err());
    }

    #[test]
    fn capabilities_are_network_bound_and_not_streaming() {
        let p = provider();
        let caps = SttProvider::capabilities(&p);
        assert!(caps.requires_network);
        assert!(!caps.supports_streaming);
        assert!(!caps.requires_local_model);
    }

    #[tokio::test]
    async fn transcribe_rejects_empty_audio() {
        let p = provider();
        let audio = AudioData::new(vec![], AudioFormat::Wav);
        let result = p.transcribe(audio, &TranscribeOptions::default()).await;
        assert!(matches!(result, Err(SpeechError::InvalidAudio(_))));
    }

    #[tokio::test]
    async fn synthesize_rejects_empty_text() {
        let p = provider();
        let result = p.synthesize("", &SynthesizeOptions::default()).await;
        assert!(matches!(result, Err(SpeechError::SynthesisFailed(_))));
    }

    #[tokio::test]
    async fn voices_contain_default() {
        let p = provider();
        let voices = p.list_voices().await.unwrap();
        assert!(voices.iter().any(|v| v.id == p.default_voice()));
    }
}
