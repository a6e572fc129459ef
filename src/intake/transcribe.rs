use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::debug;

use crate::limits::MAX_AUDIO_BYTES;

use super::IntakeError;
use super::nlu::external;

/// Voice notes from the messaging transport are 16 kHz mono.
pub const VOICE_NOTE_SAMPLE_RATE_HZ: u32 = 16_000;

/// Speech-to-text collaborator.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: Bytes, sample_rate_hz: u32) -> Result<String, IntakeError>;
}

/// Where inbound media attachments are downloaded from.
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Bytes, IntakeError>;
}

fn transcription_failed(e: IntakeError) -> IntakeError {
    match e {
        IntakeError::Timeout(_) => e,
        other => IntakeError::TranscriptionFailed(other.to_string()),
    }
}

/// Client for an OpenAI-compatible `/audio/transcriptions` endpoint.
pub struct WhisperClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl WhisperClient {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, IntakeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IntakeError::ExternalServiceError(format!("stt client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
        })
    }
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}

#[async_trait]
impl Transcriber for WhisperClient {
    async fn transcribe(&self, audio: Bytes, sample_rate_hz: u32) -> Result<String, IntakeError> {
        if audio.is_empty() {
            return Err(IntakeError::TranscriptionFailed("empty audio".into()));
        }
        if audio.len() > MAX_AUDIO_BYTES {
            return Err(IntakeError::TranscriptionFailed("audio too large".into()));
        }
        debug!("transcribing {} bytes at {sample_rate_hz} Hz", audio.len());

        let file = Part::bytes(audio.to_vec())
            .file_name("voice-note.ogg")
            .mime_str("audio/ogg")
            .map_err(|e| transcription_failed(external("stt", e)))?;
        let form = Form::new()
            .text("model", self.model.clone())
            .text("response_format", "json")
            .part("file", file);
        let mut request = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .multipart(form);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| transcription_failed(external("stt", e)))?;
        let status = response.status();
        if !status.is_success() {
            return Err(IntakeError::TranscriptionFailed(format!("stt returned {status}")));
        }
        let parsed: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| transcription_failed(external("stt", e)))?;
        let text = parsed.text.trim().to_string();
        if text.is_empty() {
            return Err(IntakeError::TranscriptionFailed("no speech recognised".into()));
        }
        Ok(text)
    }
}

/// Downloads media over HTTP, with basic auth when the transport requires it.
pub struct HttpMediaSource {
    client: reqwest::Client,
    credentials: Option<(String, String)>,
}

impl HttpMediaSource {
    pub fn new(credentials: Option<(String, String)>, timeout: Duration) -> Result<Self, IntakeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IntakeError::ExternalServiceError(format!("media client: {e}")))?;
        Ok(Self { client, credentials })
    }
}

#[async_trait]
impl MediaSource for HttpMediaSource {
    async fn fetch(&self, url: &str) -> Result<Bytes, IntakeError> {
        let mut request = self.client.get(url);
        if let Some((user, password)) = &self.credentials {
            request = request.basic_auth(user, Some(password));
        }
        let response = request.send().await.map_err(|e| external("media", e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(IntakeError::ExternalServiceError(format!("media returned {status}")));
        }
        if response
            .content_length()
            .is_some_and(|len| len > MAX_AUDIO_BYTES as u64)
        {
            return Err(IntakeError::TranscriptionFailed("audio too large".into()));
        }
        let audio = response.bytes().await.map_err(|e| external("media", e))?;
        if audio.len() > MAX_AUDIO_BYTES {
            return Err(IntakeError::TranscriptionFailed("audio too large".into()));
        }
        Ok(audio)
    }
}
