//! Two-layer duplicate suppression.
//!
//! [`WatchState`] remembers the last line emitted by this process and makes
//! repeated notifications for an unchanged journal free. The
//! [`EmissionLedger`] remembers lines across restarts.

use tracing::debug;

use crate::error::VoiceResult;
use crate::journal::DialogueLine;
use crate::ledger::EmissionLedger;

/// Process-local memory of what was spoken last
#[derive(Debug, Default, Clone)]
pub struct WatchState {
    pub last_emitted: Option<DialogueLine>,
}

/// What to do with a candidate line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Same as the last emitted line, nothing to do
    Suppress,
    /// New for this run, continue with synthesis and playback
    Emit,
}

#[derive(Debug)]
pub struct DedupGate {
    state: WatchState,
    ledger: EmissionLedger,
}

impl DedupGate {
    pub fn new(ledger: EmissionLedger) -> Self {
        Self {
            state: WatchState::default(),
            ledger,
        }
    }

    pub fn state(&self) -> &WatchState {
        &self.state
    }

    /// Fast path, no I/O
    pub fn check(&self, candidate: &DialogueLine) -> GateDecision {
        if self.state.last_emitted.as_ref() == Some(candidate) {
            debug!("🔁 Unchanged line, suppressing: '{}'", candidate.text);
            GateDecision::Suppress
        } else {
            GateDecision::Emit
        }
    }

    /// Record `candidate` as emitted: ledger first, then the in-memory state.
    ///
    /// If the ledger write fails the state is left alone, so the next
    /// notification retries the whole line. Returns `true` when the ledger
    /// gained an entry.
    pub fn commit(&mut self, candidate: &DialogueLine) -> VoiceResult<bool> {
        let appended = self.ledger.record(candidate)?;
        self.state.last_emitted = Some(candidate.clone());
        Ok(appended)
    }

    /// Remember `candidate` for this run only
    pub fn remember(&mut self, candidate: &DialogueLine) {
        self.state.last_emitted = Some(candidate.clone());
    }
}
