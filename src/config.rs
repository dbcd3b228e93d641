use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{VoiceError, VoiceResult};

/// Environment variable that overrides `api_key`
pub const API_KEY_ENV: &str = "ELEVENLABS_API_KEY";
/// Environment variable that overrides `voice_id`
pub const VOICE_ID_ENV: &str = "ELEVENLABS_VOICE_ID";

/// Steam app id of Elite Dangerous, used to find the Proton prefix
const ELITE_APP_ID: &str = "359320";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // Speech provider
    pub provider: String,
    pub api_url: String,
    pub api_key: String,
    pub voice_id: String,
    pub model_id: String,
    pub request_timeout_secs: u64,

    // Journal
    pub journal_dir: String,
    pub watch_backend: String,
    pub poll_interval_ms: u64,

    // Storage
    pub ledger_path: String,
    pub cache_dir: String,
    pub history_log: String,

    // Playback
    pub play_audio: bool,

    // Meta
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("elite-voices");

        Self {
            provider: "elevenlabs".to_string(),
            api_url: "https://api.elevenlabs.io".to_string(),
            api_key: String::new(),
            voice_id: String::new(),
            model_id: "eleven_multilingual_v2".to_string(),
            request_timeout_secs: 30,
            journal_dir: default_journal_dir().to_string_lossy().to_string(),
            watch_backend: "poll".to_string(),
            poll_interval_ms: 1000,
            ledger_path: data_dir
                .join("voice_lines.json")
                .to_string_lossy()
                .to_string(),
            cache_dir: data_dir.join("audio").to_string_lossy().to_string(),
            history_log: data_dir.join("watch.log").to_string_lossy().to_string(),
            play_audio: true,
            log_level: "INFO".to_string(),
        }
    }
}

impl Config {
    /// Load config from the default location, or create default
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path())
    }

    /// Load config from `path`, falling back to defaults when absent or corrupt
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        match serde_json::from_str(&content) {
            Ok(config) => Ok(config),
            Err(e) => {
                tracing::warn!("⚠️ Config file corrupted or invalid, using defaults: {}", e);
                let backup_path = path.with_extension("json.corrupt");
                let _ = std::fs::rename(path, &backup_path);
                Ok(Self::default())
            }
        }
    }

    /// Apply credential overrides from the environment
    pub fn apply_env(&mut self) {
        self.apply_overrides(
            std::env::var(API_KEY_ENV).ok(),
            std::env::var(VOICE_ID_ENV).ok(),
        );
    }

    fn apply_overrides(&mut self, api_key: Option<String>, voice_id: Option<String>) {
        if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
            self.api_key = key;
        }
        if let Some(voice) = voice_id.filter(|v| !v.trim().is_empty()) {
            self.voice_id = voice;
        }
    }

    /// Check everything that must hold before the watcher starts
    pub fn validate(&self) -> VoiceResult<()> {
        if self.api_key.trim().is_empty() {
            return Err(VoiceError::Config(format!(
                "no API key configured (set api_key in {} or {})",
                config_path().display(),
                API_KEY_ENV
            )));
        }
        if self.voice_id.trim().is_empty() {
            return Err(VoiceError::Config(format!(
                "no voice id configured (set voice_id in {} or {})",
                config_path().display(),
                VOICE_ID_ENV
            )));
        }

        let journal_dir = self.journal_dir();
        if !journal_dir.is_dir() {
            return Err(VoiceError::Config(format!(
                "journal directory is not reachable: {}",
                journal_dir.display()
            )));
        }

        if !matches!(self.watch_backend.as_str(), "poll" | "native") {
            return Err(VoiceError::Config(format!(
                "unknown watch backend '{}' (expected 'poll' or 'native')",
                self.watch_backend
            )));
        }

        Ok(())
    }

    pub fn journal_dir(&self) -> PathBuf {
        PathBuf::from(&self.journal_dir)
    }

    pub fn ledger_path(&self) -> PathBuf {
        PathBuf::from(&self.ledger_path)
    }

    pub fn cache_dir(&self) -> PathBuf {
        PathBuf::from(&self.cache_dir)
    }

    pub fn history_log(&self) -> Option<PathBuf> {
        if self.history_log.is_empty() {
            None
        } else {
            Some(PathBuf::from(&self.history_log))
        }
    }
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("elite-voices")
        .join("config.json")
}

/// Where the game writes its journal files.
///
/// On Linux the game runs under Proton, so the Windows "Saved Games" folder
/// lives inside the Steam compatdata prefix.
pub fn default_journal_dir() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    let saved_games = Path::new("Saved Games")
        .join("Frontier Developments")
        .join("Elite Dangerous");

    if cfg!(target_os = "linux") {
        let proton = home
            .join(".local/share/Steam/steamapps/compatdata")
            .join(ELITE_APP_ID)
            .join("pfx/drive_c/users/steamuser")
            .join(&saved_games);
        if proton.is_dir() {
            return proton;
        }
    }

    home.join(saved_games)
}
