//! ElevenLabs text-to-speech over HTTP

use super::SpeechSynthesizer;
use crate::config::Config;
use crate::error::{VoiceError, VoiceResult};
use anyhow::Result;
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;
use tracing::{debug, info, warn};

const API_KEY_HEADER: &str = "xi-api-key";

/// Failure of a single HTTP attempt
#[derive(Debug)]
enum AttemptError {
    /// Network trouble or a 5xx/429, worth another try
    Transient(anyhow::Error),
    /// The request itself is wrong; retrying cannot help
    Permanent(anyhow::Error),
}

impl AttemptError {
    fn is_transient(&self) -> bool {
        matches!(self, AttemptError::Transient(_))
    }

    fn into_inner(self) -> anyhow::Error {
        match self {
            AttemptError::Transient(e) | AttemptError::Permanent(e) => e,
        }
    }
}

pub struct ElevenLabsSynthesizer {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model_id: String,
}

impl std::fmt::Debug for ElevenLabsSynthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElevenLabsSynthesizer")
            .field("api_url", &self.api_url)
            .field("model_id", &self.model_id)
            .finish()
    }
}

impl ElevenLabsSynthesizer {
    pub fn new(config: &Config) -> VoiceResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs.max(1)))
            .build()
            .map_err(|e| VoiceError::Config(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model_id: config.model_id.clone(),
        })
    }

    fn speech_url(&self, voice_id: &str) -> String {
        format!(
            "{}/v1/text-to-speech/{}",
            self.api_url,
            urlencoding::encode(voice_id)
        )
    }

    async fn request_speech(&self, text: &str, voice_id: &str) -> Result<Vec<u8>, AttemptError> {
        let response = self
            .client
            .post(self.speech_url(voice_id))
            .header(API_KEY_HEADER, &self.api_key)
            .header(reqwest::header::ACCEPT, "audio/mpeg")
            .json(&serde_json::json!({
                "text": text,
                "model_id": self.model_id,
            }))
            .send()
            .await
            .map_err(|e| AttemptError::Transient(anyhow::anyhow!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = anyhow::anyhow!("ElevenLabs API error ({}): {}", status, body);
            return Err(if is_retryable(status) {
                AttemptError::Transient(err)
            } else {
                AttemptError::Permanent(err)
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AttemptError::Transient(anyhow::anyhow!("reading audio failed: {}", e)))?;
        if bytes.is_empty() {
            return Err(AttemptError::Permanent(anyhow::anyhow!(
                "ElevenLabs returned no audio"
            )));
        }
        Ok(bytes.to_vec())
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsSynthesizer {
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>> {
        info!("🗣️ Synthesizing with voice {}: '{}'", voice_id, text);

        // 200ms, then 400ms
        let strategy = ExponentialBackoff::from_millis(2)
            .factor(100)
            .max_delay(Duration::from_secs(2))
            .map(jitter)
            .take(2);
        let audio = RetryIf::spawn(
            strategy,
            || self.request_speech(text, voice_id),
            |e: &AttemptError| {
                if e.is_transient() {
                    warn!("⚠️ ElevenLabs request failed, retrying: {:?}", e);
                }
                e.is_transient()
            },
        )
        .await
        .map_err(AttemptError::into_inner)?;

        debug!("🎧 Received {} bytes of audio", audio.len());
        Ok(audio)
    }

    async fn verify(&self) -> Result<()> {
        let response = match self
            .client
            .get(format!("{}/v1/user", self.api_url))
            .header(API_KEY_HEADER, &self.api_key)
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                // Offline at startup is not fatal, the next line will retry.
                warn!("⚠️ Could not reach ElevenLabs to verify the API key: {}", e);
                return Ok(());
            }
        };

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(anyhow::anyhow!(
                "ElevenLabs rejected the API key ({})",
                response.status()
            )),
            status if status.is_success() => {
                info!("🔑 ElevenLabs API key accepted");
                Ok(())
            }
            status => {
                warn!("⚠️ ElevenLabs key check returned {}", status);
                Ok(())
            }
        }
    }

    fn name(&self) -> &str {
        "elevenlabs"
    }
}
