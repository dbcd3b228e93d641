//! Player journal reading
//!
//! The game writes one JSON object per line into `Journal.<timestamp>.log`
//! files. This module turns those files into [`LogEvent`]s and finds the
//! newest journal in a directory.

pub mod selector;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind, Lines};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{VoiceError, VoiceResult};

pub use selector::{is_npc_dialogue, select_latest_dialogue};

lazy_static! {
    static ref JOURNAL_NAME: Regex =
        Regex::new(r"^Journal\.\d{4}-\d{2}-\d{2}T\d{6}\.\d{2}\.log$").expect("valid regex");
}

/// Marker the game embeds in the sender of NPC messages
pub const NPC_NAME_MARKER: &str = "$npc_name_decorate:#name=";

/// One parsed journal line
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LogEvent {
    #[serde(default)]
    pub timestamp: String,
    #[serde(rename = "event")]
    pub event_kind: String,
    #[serde(rename = "Channel", default)]
    pub channel: String,
    #[serde(rename = "From", default)]
    pub sender: String,
    #[serde(rename = "From_Localised", default)]
    pub sender_localised: Option<String>,
    #[serde(rename = "Message", default)]
    pub message: Option<String>,
    #[serde(rename = "Message_Localised", default)]
    pub localized_text: Option<String>,
}

/// The part of an NPC message that gets spoken
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DialogueLine {
    pub speaker_tag: String,
    pub text: String,
}

impl DialogueLine {
    pub fn new(speaker_tag: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            speaker_tag: speaker_tag.into(),
            text: text.into(),
        }
    }

    /// Build a line from an event that passed [`is_npc_dialogue`]
    pub fn from_event(event: &LogEvent) -> Self {
        Self {
            speaker_tag: event.sender.clone(),
            text: event.localized_text.clone().unwrap_or_default(),
        }
    }

    /// Human readable speaker, e.g. `Officer` for `$npc_name_decorate:#name=Officer;`
    pub fn speaker_name(&self) -> &str {
        match self.speaker_tag.find(NPC_NAME_MARKER) {
            Some(idx) => {
                let rest = &self.speaker_tag[idx + NPC_NAME_MARKER.len()..];
                rest.split(';').next().unwrap_or(rest)
            }
            None => &self.speaker_tag,
        }
    }
}

/// A journal file on disk; every call to [`JournalReader::events`] starts
/// again from the first line.
#[derive(Debug, Clone)]
pub struct JournalReader {
    path: PathBuf,
}

impl JournalReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Lazily parse the journal, one line at a time
    pub fn events(&self) -> VoiceResult<JournalEvents> {
        let file = File::open(&self.path).map_err(|e| {
            VoiceError::Journal(format!("cannot open {}: {}", self.path.display(), e))
        })?;

        Ok(JournalEvents {
            path: self.path.clone(),
            lines: BufReader::new(file).lines(),
            line_no: 0,
            skipped: 0,
        })
    }
}

/// Iterator over the events of one journal file
pub struct JournalEvents {
    path: PathBuf,
    lines: Lines<BufReader<File>>,
    line_no: usize,
    skipped: usize,
}

impl JournalEvents {
    /// Lines that could not be parsed so far
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl Iterator for JournalEvents {
    type Item = LogEvent;

    fn next(&mut self) -> Option<LogEvent> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) if e.kind() == ErrorKind::InvalidData => {
                    self.line_no += 1;
                    self.skipped += 1;
                    warn!(
                        "⚠️ {}:{} is not valid UTF-8, skipping",
                        self.path.display(),
                        self.line_no
                    );
                    continue;
                }
                Err(e) => {
                    warn!("⚠️ Stopped reading {}: {}", self.path.display(), e);
                    return None;
                }
            };
            self.line_no += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            match serde_json::from_str::<LogEvent>(trimmed) {
                Ok(event) => return Some(event),
                Err(e) => {
                    self.skipped += 1;
                    warn!(
                        "⚠️ {}:{} is not a valid journal record ({}): {}",
                        self.path.display(),
                        self.line_no,
                        e,
                        trimmed
                    );
                }
            }
        }
    }
}

/// Does `file_name` look like `Journal.2024-01-31T205114.01.log`?
pub fn is_journal_file_name(file_name: &str) -> bool {
    JOURNAL_NAME.is_match(file_name)
}

pub fn is_journal_path(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(is_journal_file_name)
        .unwrap_or(false)
}

/// Find the most recently created journal below `dir`.
///
/// Creation time is used when the platform reports it, modification time
/// otherwise. Equal times fall back to the file name, whose timestamp sorts
/// chronologically.
pub fn find_latest_journal(dir: &Path) -> VoiceResult<Option<PathBuf>> {
    if !dir.is_dir() {
        return Err(VoiceError::Journal(format!(
            "journal directory is not reachable: {}",
            dir.display()
        )));
    }

    let mut latest: Option<(SystemTime, PathBuf)> = None;

    for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() || !is_journal_path(entry.path()) {
            continue;
        }

        let created = entry
            .metadata()
            .ok()
            .and_then(|meta| meta.created().or_else(|_| meta.modified()).ok())
            .unwrap_or(SystemTime::UNIX_EPOCH);

        let newer = match &latest {
            Some((time, path)) => (created, entry.path()) > (*time, path.as_path()),
            None => true,
        };
        if newer {
            latest = Some((created, entry.path().to_path_buf()));
        }
    }

    if let Some((_, path)) = &latest {
        debug!("📄 Newest journal: {}", path.display());
    }
    Ok(latest.map(|(_, path)| path))
}
