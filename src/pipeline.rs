//! One pass over the newest journal: select, dedup, synthesize, play.

use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::audio::AudioPlayer;
use crate::cache::ArtifactCache;
use crate::dedup::{DedupGate, GateDecision, WatchState};
use crate::error::{VoiceError, VoiceResult};
use crate::history::HistoryLog;
use crate::journal::{select_latest_dialogue, DialogueLine, JournalReader};
use crate::ledger::EmissionLedger;
use crate::tts::SpeechSynthesizer;

/// How a pipeline run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The journal holds no NPC dialogue
    NoCandidate,
    /// The newest line was already emitted by this process
    Suppressed(DialogueLine),
    /// The newest line has no text
    EmptyText(DialogueLine),
    /// The provider failed; the line will be retried on the next trigger
    SynthesisFailed(DialogueLine),
    /// The line was resolved to audio and handed to the player
    Emitted {
        line: DialogueLine,
        cached: bool,
        recorded: bool,
        played: bool,
    },
}

/// What a scan of the journal found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanResult {
    Nothing,
    Suppressed(DialogueLine),
    Candidate(DialogueLine),
}

/// Everything a run needs, owned in one place instead of process globals
pub struct PipelineContext {
    voice_id: String,
    gate: DedupGate,
    cache: ArtifactCache,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    player: Arc<dyn AudioPlayer>,
    history: Option<HistoryLog>,
}

impl std::fmt::Debug for PipelineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineContext")
            .field("voice_id", &self.voice_id)
            .field("synthesizer", &self.synthesizer.name())
            .field("player", &self.player.name())
            .finish()
    }
}

impl PipelineContext {
    pub fn new(
        voice_id: impl Into<String>,
        ledger: EmissionLedger,
        cache: ArtifactCache,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        player: Arc<dyn AudioPlayer>,
    ) -> Self {
        Self {
            voice_id: voice_id.into(),
            gate: DedupGate::new(ledger),
            cache,
            synthesizer,
            player,
            history: None,
        }
    }

    pub fn with_history(mut self, history: HistoryLog) -> Self {
        self.history = Some(history);
        self
    }

    pub fn state(&self) -> &WatchState {
        self.gate.state()
    }

    /// Append to the history log, if one is configured
    pub fn note(&self, entry: &str) {
        if let Some(history) = &self.history {
            if let Err(e) = history.record(entry) {
                warn!("⚠️ Failed to write history log: {}", e);
            }
        }
    }

    /// Read `journal` and decide whether its newest NPC line needs emitting
    pub fn scan(&self, journal: &Path) -> VoiceResult<ScanResult> {
        let mut events = JournalReader::new(journal).events()?;
        let candidate = select_latest_dialogue(events.by_ref());
        if events.skipped() > 0 {
            debug!(
                "Skipped {} unreadable line(s) in {}",
                events.skipped(),
                journal.display()
            );
        }
        let Some(candidate) = candidate else {
            debug!("💤 No NPC dialogue in {}", journal.display());
            return Ok(ScanResult::Nothing);
        };

        Ok(match self.gate.check(&candidate) {
            GateDecision::Suppress => ScanResult::Suppressed(candidate),
            GateDecision::Emit => ScanResult::Candidate(candidate),
        })
    }

    /// Resolve audio for a new line, record it and hand it to the player.
    ///
    /// Per-line problems (no text, provider down, playback error) are logged
    /// and reported through [`RunOutcome`]. Ledger and cache I/O errors are
    /// returned; nothing is marked as emitted, so the next notification
    /// tries again.
    pub async fn emit(&mut self, candidate: DialogueLine) -> VoiceResult<RunOutcome> {
        info!("💬 {}: '{}'", candidate.speaker_name(), candidate.text);

        let artifact = match self
            .cache
            .resolve(&candidate.text, &self.voice_id, self.synthesizer.as_ref())
            .await
        {
            Ok(artifact) => artifact,
            Err(VoiceError::EmptyText) => {
                warn!(
                    "⚠️ Line from {} has no speakable text, skipping",
                    candidate.speaker_name()
                );
                self.gate.remember(&candidate);
                return Ok(RunOutcome::EmptyText(candidate));
            }
            Err(VoiceError::Synthesis(e)) => {
                warn!("⚠️ Speech synthesis failed, will retry: {}", e);
                return Ok(RunOutcome::SynthesisFailed(candidate));
            }
            Err(e) => return Err(e),
        };

        let recorded = self.gate.commit(&candidate)?;
        self.note(&format!("{}: {}", candidate.speaker_name(), candidate.text));

        let played = match self.player.play(&artifact.audio).await {
            Ok(()) => true,
            Err(e) => {
                warn!("⚠️ Playback failed for {}: {}", artifact.path.display(), e);
                false
            }
        };

        Ok(RunOutcome::Emitted {
            line: candidate,
            cached: artifact.cached,
            recorded,
            played,
        })
    }

    /// Scan `journal` and emit its newest line if it is new
    pub async fn run(&mut self, journal: &Path) -> VoiceResult<RunOutcome> {
        match self.scan(journal)? {
            ScanResult::Nothing => Ok(RunOutcome::NoCandidate),
            ScanResult::Suppressed(line) => Ok(RunOutcome::Suppressed(line)),
            ScanResult::Candidate(line) => self.emit(line).await,
        }
    }
}
