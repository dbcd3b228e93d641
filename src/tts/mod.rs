//! Speech synthesis providers
//!
//! The pipeline only ever sees [`SpeechSynthesizer`]; the concrete provider
//! is picked from the configuration.

use crate::config::Config;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::error::{VoiceError, VoiceResult};

pub mod elevenlabs;

/// Turns text into encoded audio
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync + std::fmt::Debug {
    /// Render `text` with the voice `voice_id`, returning the audio bytes
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>>;

    /// Check credentials before the watcher starts
    async fn verify(&self) -> Result<()> {
        Ok(())
    }

    /// Get the provider name
    fn name(&self) -> &str;
}

/// Factory to create the configured provider
pub fn create_synthesizer(config: &Config) -> VoiceResult<Arc<dyn SpeechSynthesizer>> {
    info!("🛠️ Creating speech provider: {}", config.provider);
    let synthesizer: Arc<dyn SpeechSynthesizer> = match config.provider.as_str() {
        "elevenlabs" => Arc::new(elevenlabs::ElevenLabsSynthesizer::new(config)?),
        other => {
            return Err(VoiceError::Config(format!(
                "unknown speech provider '{}'",
                other
            )))
        }
    };
    info!("✅ Speech provider '{}' initialized", synthesizer.name());
    Ok(synthesizer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_provider_is_rejected() {
        let config = Config {
            provider: "carrier-pigeon".to_string(),
            ..Config::default()
        };
        let err = create_synthesizer(&config).unwrap_err();
        assert!(err.to_string().contains("carrier-pigeon"));
    }

    #[test]
    fn test_elevenlabs_is_default() {
        let config = Config {
            api_key: "key".to_string(),
            ..Config::default()
        };
        let synthesizer = create_synthesizer(&config).unwrap();
        assert_eq!(synthesizer.name(), "elevenlabs");
    }
}
