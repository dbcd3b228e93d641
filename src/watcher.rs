//! Journal directory watcher
//!
//! Turns file-system notifications into pipeline runs. The loop moves through
//! `Idle -> Scanning -> (Suppressed | Emitting) -> Idle` for every batch of
//! modifications and only ever runs one pipeline at a time.

use notify::event::{CreateKind, ModifyKind};
use notify::{Event, EventKind, PollWatcher, RecursiveMode, Watcher};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::error::{VoiceError, VoiceResult};
use crate::journal::{find_latest_journal, is_journal_path};
use crate::pipeline::{PipelineContext, RunOutcome, ScanResult};

/// Where the loop currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchPhase {
    Idle,
    Scanning,
    Suppressed,
    Emitting,
}

/// Which notification mechanism to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WatchBackend {
    /// Periodic directory scans; works on network drives and Proton prefixes
    #[default]
    Poll,
    /// inotify / FSEvents / ReadDirectoryChangesW
    Native,
}

impl FromStr for WatchBackend {
    type Err = VoiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "poll" => Ok(WatchBackend::Poll),
            "native" => Ok(WatchBackend::Native),
            other => Err(VoiceError::Config(format!(
                "unknown watch backend '{}'",
                other
            ))),
        }
    }
}

/// A notification about a journal file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    Created(PathBuf),
    Modified(PathBuf),
}

/// Size and full-precision modification time of a journal
#[derive(Debug, Clone, PartialEq, Eq)]
struct JournalStamp {
    path: PathBuf,
    len: u64,
    modified: Option<SystemTime>,
}

impl JournalStamp {
    fn take(path: &Path) -> Option<Self> {
        let metadata = std::fs::metadata(path).ok()?;
        Some(Self {
            path: path.to_path_buf(),
            len: metadata.len(),
            modified: metadata.modified().ok(),
        })
    }
}

/// Keep only creations and modifications of journal files
pub fn classify(event: &Event) -> Vec<Observation> {
    let journals = event.paths.iter().filter(|p| is_journal_path(p)).cloned();
    match event.kind {
        EventKind::Create(CreateKind::Folder) => Vec::new(),
        EventKind::Create(_) => journals.map(Observation::Created).collect(),
        EventKind::Modify(ModifyKind::Name(_)) => Vec::new(),
        EventKind::Modify(_) => journals.map(Observation::Modified).collect(),
        _ => Vec::new(),
    }
}

pub struct WatchLoop {
    dir: PathBuf,
    backend: WatchBackend,
    poll_interval: Duration,
    pipeline: PipelineContext,
    phase: WatchPhase,
    current_journal: Option<PathBuf>,
    followed: Option<JournalStamp>,
}

impl WatchLoop {
    pub fn new(dir: impl Into<PathBuf>, pipeline: PipelineContext) -> Self {
        Self {
            dir: dir.into(),
            backend: WatchBackend::default(),
            poll_interval: Duration::from_secs(1),
            pipeline,
            phase: WatchPhase::Idle,
            current_journal: None,
            followed: None,
        }
    }

    pub fn with_backend(mut self, backend: WatchBackend, poll_interval: Duration) -> Self {
        self.backend = backend;
        self.poll_interval = poll_interval;
        self
    }

    pub fn phase(&self) -> WatchPhase {
        self.phase
    }

    /// Run the pipeline once against the newest journal in the directory.
    ///
    /// Returns `None` when the directory has no journal yet.
    pub async fn scan(&mut self) -> VoiceResult<Option<RunOutcome>> {
        self.phase = WatchPhase::Scanning;
        let result = self.scan_inner().await;
        self.phase = WatchPhase::Idle;
        result
    }

    async fn scan_inner(&mut self) -> VoiceResult<Option<RunOutcome>> {
        let Some(journal) = find_latest_journal(&self.dir)? else {
            debug!("💤 No journal in {}", self.dir.display());
            return Ok(None);
        };

        if self.current_journal.as_ref() != Some(&journal) {
            info!("📄 Following journal {}", journal.display());
            self.current_journal = Some(journal.clone());
        }
        // Stamped before reading so a write racing the scan is seen next tick
        self.followed = JournalStamp::take(&journal);

        let outcome = match self.pipeline.scan(&journal)? {
            ScanResult::Nothing => RunOutcome::NoCandidate,
            ScanResult::Suppressed(line) => {
                self.phase = WatchPhase::Suppressed;
                RunOutcome::Suppressed(line)
            }
            ScanResult::Candidate(line) => {
                self.phase = WatchPhase::Emitting;
                self.pipeline.emit(line).await?
            }
        };
        Ok(Some(outcome))
    }

    fn start_watcher(
        &self,
        tx: mpsc::UnboundedSender<notify::Result<Event>>,
    ) -> VoiceResult<Box<dyn Watcher + Send>> {
        let handler = move |result: notify::Result<Event>| {
            if tx.send(result).is_err() {
                debug!("Journal watcher receiver dropped");
            }
        };

        let mut watcher: Box<dyn Watcher + Send> = match self.backend {
            WatchBackend::Poll => {
                let config = notify::Config::default().with_poll_interval(self.poll_interval);
                Box::new(PollWatcher::new(handler, config)?)
            }
            WatchBackend::Native => Box::new(notify::recommended_watcher(handler)?),
        };

        watcher.watch(&self.dir, RecursiveMode::Recursive)?;
        Ok(watcher)
    }

    /// Watch until `shutdown` resolves.
    ///
    /// The stop signal is only looked at between batches, so a run that is
    /// writing the ledger always finishes first. Returns the pipeline so the
    /// caller can inspect its final state.
    pub async fn run<F>(mut self, shutdown: F) -> VoiceResult<PipelineContext>
    where
        F: Future<Output = ()>,
    {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _watcher = self.start_watcher(tx)?;
        tokio::pin!(shutdown);
        self.rebaseline();

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            "👀 Watching {} ({:?} backend)",
            self.dir.display(),
            self.backend
        );

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("🛑 Stop requested, watcher shutting down");
                    break;
                }
                received = rx.recv() => {
                    let Some(first) = received else {
                        warn!("⚠️ Journal watcher stopped delivering events");
                        break;
                    };

                    // Everything queued so far is covered by one rescan.
                    let mut batch = vec![first];
                    while let Ok(more) = rx.try_recv() {
                        batch.push(more);
                    }
                    self.handle_batch(batch).await;
                }
                _ = ticker.tick() => {
                    self.check_followed().await;
                }
            }
        }

        Ok(self.pipeline)
    }

    async fn handle_batch(&mut self, batch: Vec<notify::Result<Event>>) {
        let mut modified = false;

        for result in batch {
            let event = match result {
                Ok(event) => event,
                Err(e) => {
                    warn!("⚠️ Journal watcher error: {}", e);
                    continue;
                }
            };

            for observation in classify(&event) {
                match observation {
                    Observation::Created(path) => {
                        info!("🆕 Journal created: {}", path.display());
                        self.pipeline
                            .note(&format!("Journal created: {}", path.display()));
                        self.rebaseline();
                    }
                    Observation::Modified(path) => {
                        debug!("✏️ Journal modified: {}", path.display());
                        self.pipeline
                            .note(&format!("Journal modified: {}", path.display()));
                        modified = true;
                    }
                }
            }
        }

        if modified {
            self.rescan().await;
        }
    }

    /// Follow the newest journal without reading it
    fn rebaseline(&mut self) {
        self.followed = match find_latest_journal(&self.dir) {
            Ok(latest) => latest.and_then(|path| JournalStamp::take(&path)),
            Err(e) => {
                warn!("⚠️ Could not list journals: {}", e);
                None
            }
        };
    }

    /// Stat the followed journal and rescan when it changed since the last look.
    ///
    /// The poll backend keeps modification times in whole seconds, so an
    /// append landing in the same second as its snapshot only shows up here.
    async fn check_followed(&mut self) {
        let Some(previous) = self.followed.clone() else {
            return;
        };

        match JournalStamp::take(&previous.path) {
            None => self.followed = None,
            Some(current) if current == previous => {}
            Some(current) => {
                debug!("✏️ Journal changed: {}", current.path.display());
                self.pipeline
                    .note(&format!("Journal modified: {}", current.path.display()));
                self.followed = Some(current);
                self.rescan().await;
            }
        }
    }

    async fn rescan(&mut self) {
        match self.scan().await {
            Ok(Some(RunOutcome::Emitted { line, cached, .. })) => {
                debug!(
                    "✅ Emitted '{}' ({})",
                    line.text,
                    if cached { "cached" } else { "synthesized" }
                );
            }
            Ok(_) => {}
            Err(e) => {
                error!("❌ Pipeline run aborted, will retry on next change: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{DataChange, RenameMode};

    fn event(kind: EventKind, path: &str) -> Event {
        Event::new(kind).add_path(PathBuf::from(path))
    }

    const JOURNAL: &str = "/saves/Journal.2024-01-31T205114.01.log";

    #[test]
    fn test_classify_journal_events() {
        assert_eq!(
            classify(&event(EventKind::Create(CreateKind::File), JOURNAL)),
            vec![Observation::Created(PathBuf::from(JOURNAL))]
        );
        assert_eq!(
            classify(&event(
                EventKind::Modify(ModifyKind::Data(DataChange::Content)),
                JOURNAL
            )),
            vec![Observation::Modified(PathBuf::from(JOURNAL))]
        );
        assert_eq!(
            classify(&event(EventKind::Modify(ModifyKind::Any), JOURNAL)),
            vec![Observation::Modified(PathBuf::from(JOURNAL))]
        );
    }

    #[test]
    fn test_classify_ignores_other_events() {
        assert!(classify(&event(
            EventKind::Modify(ModifyKind::Any),
            "/saves/Status.json"
        ))
        .is_empty());
        assert!(classify(&event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Any)),
            JOURNAL
        ))
        .is_empty());
        assert!(classify(&event(
            EventKind::Remove(notify::event::RemoveKind::File),
            JOURNAL
        ))
        .is_empty());
    }

    #[test]
    fn test_stamp_tracks_appends() {
        use std::io::Write;

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("Journal.2024-01-31T205114.01.log");
        std::fs::write(&path, "{}\n").unwrap();

        let before = JournalStamp::take(&path).unwrap();
        assert_eq!(JournalStamp::take(&path), Some(before.clone()));

        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "{{}}").unwrap();
        drop(file);

        let after = JournalStamp::take(&path).unwrap();
        assert_ne!(after, before);
        assert_eq!(after.len, before.len + 3);

        std::fs::remove_file(&path).unwrap();
        assert_eq!(JournalStamp::take(&path), None);
    }

    #[test]
    fn test_backend_from_str() {
        assert_eq!("poll".parse::<WatchBackend>().unwrap(), WatchBackend::Poll);
        assert_eq!("Native".parse::<WatchBackend>().unwrap(), WatchBackend::Native);
        assert!("inotify".parse::<WatchBackend>().is_err());
    }
}
