//! Mock speech provider and player for testing
//!
//! Record every call for verification.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Mock provider that records synthesized text
#[derive(Debug)]
pub struct MockSynthesizer {
    /// All text that was "synthesized"
    pub calls: Arc<Mutex<Vec<String>>>,
    /// Simulate provider failure
    pub should_fail: Arc<Mutex<bool>>,
}

impl MockSynthesizer {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            should_fail: Arc::new(Mutex::new(false)),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn set_failing(&self, failing: bool) {
        *self.should_fail.lock().unwrap() = failing;
    }
}

impl Default for MockSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl elite_voices::tts::SpeechSynthesizer for MockSynthesizer {
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>> {
        self.calls.lock().unwrap().push(text.to_string());
        if *self.should_fail.lock().unwrap() {
            return Err(anyhow::anyhow!("Mock provider failure"));
        }
        Ok(format!("{}|{}", voice_id, text).into_bytes())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Mock player that records every clip it was given
#[derive(Debug, Default)]
pub struct MockPlayer {
    pub played: Arc<Mutex<Vec<Vec<u8>>>>,
    pub should_fail: Arc<Mutex<bool>>,
}

impl MockPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn play_count(&self) -> usize {
        self.played.lock().unwrap().len()
    }

    pub fn played_text(&self) -> Vec<String> {
        self.played
            .lock()
            .unwrap()
            .iter()
            .map(|clip| String::from_utf8_lossy(clip).to_string())
            .collect()
    }
}

#[async_trait]
impl elite_voices::audio::AudioPlayer for MockPlayer {
    async fn play(&self, audio: &[u8]) -> Result<()> {
        if *self.should_fail.lock().unwrap() {
            return Err(anyhow::anyhow!("Mock playback failure"));
        }
        self.played.lock().unwrap().push(audio.to_vec());
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}
