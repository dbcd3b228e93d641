//! Persistent record of dialogue lines that have already been spoken.
//!
//! The ledger is a JSON array on disk. Every update rewrites the whole file
//! through a temporary sibling and a rename, so a reader never observes a
//! half-written array.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{VoiceError, VoiceResult};
use crate::journal::DialogueLine;

#[derive(Debug, Clone)]
pub struct EmissionLedger {
    path: PathBuf,
}

impl EmissionLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read every recorded line. A missing file is an empty ledger.
    pub fn load(&self) -> VoiceResult<Vec<DialogueLine>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path).map_err(|e| {
            VoiceError::Ledger(format!("cannot read {}: {}", self.path.display(), e))
        })?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        match serde_json::from_str(&content) {
            Ok(lines) => Ok(lines),
            Err(e) => {
                // Our own writes are atomic, so this was edited by hand.
                let backup_path = self.path.with_extension("json.corrupt");
                warn!(
                    "⚠️ Ledger {} is not valid JSON ({}), moving it to {}",
                    self.path.display(),
                    e,
                    backup_path.display()
                );
                fs::rename(&self.path, &backup_path).map_err(|e| {
                    VoiceError::Ledger(format!(
                        "cannot move corrupt ledger {}: {}",
                        self.path.display(),
                        e
                    ))
                })?;
                Ok(Vec::new())
            }
        }
    }

    /// Append `line` unless an equal entry is already present.
    ///
    /// Returns `true` when the ledger changed.
    pub fn record(&self, line: &DialogueLine) -> VoiceResult<bool> {
        let mut lines = self.load()?;
        if lines.contains(line) {
            debug!("📒 Already in ledger: '{}'", line.text);
            return Ok(false);
        }

        lines.push(line.clone());
        self.save(&lines)?;
        info!("📒 Recorded line #{} in ledger", lines.len());
        Ok(true)
    }

    fn save(&self, lines: &[DialogueLine]) -> VoiceResult<()> {
        let content = serde_json::to_string_pretty(lines)?;
        write_atomic(&self.path, content.as_bytes())
            .map_err(|e| VoiceError::Ledger(format!("cannot write {}: {}", self.path.display(), e)))
    }
}

/// Replace `path` with `bytes` via a temporary file in the same directory
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(".tmp");
    let temp_file = path.with_file_name(temp_name);

    let result = (|| -> std::io::Result<()> {
        let mut file = File::create(&temp_file)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&temp_file, path)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&temp_file);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn officer(text: &str) -> DialogueLine {
        DialogueLine::new("$npc_name_decorate:#name=Officer;", text)
    }

    #[test]
    fn test_missing_ledger_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = EmissionLedger::new(dir.path().join("voice_lines.json"));
        assert!(ledger.load().unwrap().is_empty());
    }

    #[test]
    fn test_record_never_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = EmissionLedger::new(dir.path().join("voice_lines.json"));

        assert!(ledger.record(&officer("hello")).unwrap());
        for _ in 0..5 {
            assert!(!ledger.record(&officer("hello")).unwrap());
        }
        assert!(ledger.record(&officer("goodbye")).unwrap());

        let lines = ledger.load().unwrap();
        assert_eq!(lines, vec![officer("hello"), officer("goodbye")]);
    }

    #[test]
    fn test_ledger_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("voice_lines.json");
        EmissionLedger::new(&path).record(&officer("hello")).unwrap();

        let reopened = EmissionLedger::new(&path);
        assert_eq!(reopened.load().unwrap(), vec![officer("hello")]);
        assert!(!dir.path().join("data").join("voice_lines.json.tmp").exists());
    }

    #[test]
    fn test_ledger_file_is_json_array_of_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("voice_lines.json");
        EmissionLedger::new(&path).record(&officer("hello")).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw[0]["text"], "hello");
        assert_eq!(raw[0]["speaker_tag"], "$npc_name_decorate:#name=Officer;");
    }

    #[test]
    fn test_corrupt_ledger_is_set_aside() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("voice_lines.json");
        fs::write(&path, "[{\"speaker_tag\": ").unwrap();

        let ledger = EmissionLedger::new(&path);
        assert!(ledger.load().unwrap().is_empty());
        assert!(dir.path().join("voice_lines.json.corrupt").exists());
        assert!(ledger.record(&officer("hello")).unwrap());
    }

    #[test]
    fn test_unwritable_ledger_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be makes the rename fail.
        let path = dir.path().join("voice_lines.json");
        fs::create_dir_all(path.join("occupied")).unwrap();

        let ledger = EmissionLedger::new(&path);
        let err = ledger.record(&officer("hello")).unwrap_err();
        assert!(matches!(err, VoiceError::Ledger(_)));
    }
}
