#![allow(dead_code)]

pub mod mock_tts;

use elite_voices::cache::ArtifactCache;
use elite_voices::ledger::EmissionLedger;
use elite_voices::pipeline::PipelineContext;
use mock_tts::{MockPlayer, MockSynthesizer};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

pub const JOURNAL_NAME: &str = "Journal.2024-01-31T205114.01.log";
pub const OFFICER_TAG: &str = "$npc_name_decorate:#name=Officer;";
pub const OFFICER_TEXT: &str = "You've got no right to scan me, officer!";

/// Isolated journal directory, ledger and cache with mock collaborators
pub struct TestContext {
    pub temp_dir: TempDir,
    pub journal_dir: PathBuf,
    pub ledger_path: PathBuf,
    pub cache_dir: PathBuf,
    pub synthesizer: Arc<MockSynthesizer>,
    pub player: Arc<MockPlayer>,
}

impl TestContext {
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let journal_dir = temp_dir.path().join("journals");
        fs::create_dir_all(&journal_dir).expect("Failed to create journal dir");

        Self {
            ledger_path: temp_dir.path().join("data").join("voice_lines.json"),
            cache_dir: temp_dir.path().join("data").join("audio"),
            journal_dir,
            temp_dir,
            synthesizer: Arc::new(MockSynthesizer::new()),
            player: Arc::new(MockPlayer::new()),
        }
    }

    /// A fresh pipeline sharing this context's disk state and mocks
    pub fn pipeline(&self) -> PipelineContext {
        PipelineContext::new(
            "test-voice",
            EmissionLedger::new(&self.ledger_path),
            ArtifactCache::new(&self.cache_dir),
            self.synthesizer.clone(),
            self.player.clone(),
        )
    }

    pub fn journal_path(&self) -> PathBuf {
        self.journal_dir.join(JOURNAL_NAME)
    }

    /// Append raw lines to the journal, creating it if needed
    pub fn append(&self, lines: &[&str]) -> PathBuf {
        append_lines(&self.journal_path(), lines);
        self.journal_path()
    }

    pub fn ledger(&self) -> EmissionLedger {
        EmissionLedger::new(&self.ledger_path)
    }

    pub fn artifact(&self, file_name: &str) -> PathBuf {
        self.cache_dir.join(file_name)
    }
}

pub fn append_lines(path: &Path, lines: &[&str]) {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .expect("Failed to open journal");
    for line in lines {
        writeln!(file, "{}", line).expect("Failed to write journal line");
    }
}

/// A `ReceiveText` record from an NPC
pub fn npc_line(timestamp: &str, name: &str, text: &str) -> String {
    serde_json::json!({
        "timestamp": timestamp,
        "event": "ReceiveText",
        "From": format!("$npc_name_decorate:#name={};", name),
        "From_Localised": name,
        "Message": "$Police_Stop_Scan;",
        "Message_Localised": text,
        "Channel": "npc",
    })
    .to_string()
}

pub fn file_header() -> String {
    r#"{ "timestamp":"2024-01-31T20:51:14Z", "event":"Fileheader", "part":1, "language":"English/UK", "gameversion":"4.0.0.1700" }"#
        .to_string()
}
