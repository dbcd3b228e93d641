//! Elite Voices - Spoken NPC dialogue for Elite Dangerous
//!
//! Tails the player journal and plays synthesized speech for every new
//! line an NPC sends to the commander.

use anyhow::{Context, Result};
use clap::Parser;
use elite_voices::audio::{AudioPlayer, MutedPlayer, SoundEngine};
use elite_voices::cache::ArtifactCache;
use elite_voices::config::Config;
use elite_voices::history::HistoryLog;
use elite_voices::ledger::EmissionLedger;
use elite_voices::logging;
use elite_voices::pipeline::{PipelineContext, RunOutcome};
use elite_voices::tts;
use elite_voices::watcher::{WatchBackend, WatchLoop};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Config file to use instead of the default location
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Journal directory to watch
    #[arg(short, long)]
    journal_dir: Option<PathBuf>,

    /// Voice to synthesize with
    #[arg(long)]
    voice_id: Option<String>,

    /// Scan the newest journal once and exit
    #[arg(long)]
    once: bool,

    /// Resolve and cache audio without playing it
    #[arg(long)]
    mute: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log = logging::init(args.verbose)?;

    let mut config = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }?;
    if let Err(e) = log.apply_config_level(&config.log_level) {
        warn!("⚠️ Ignoring log_level '{}': {}", config.log_level, e);
    }

    info!("🚀 Elite Voices v{} starting...", env!("CARGO_PKG_VERSION"));

    config.apply_env();
    if let Some(dir) = &args.journal_dir {
        config.journal_dir = dir.to_string_lossy().to_string();
    }
    if let Some(voice) = &args.voice_id {
        config.voice_id = voice.clone();
    }
    if args.mute {
        config.play_audio = false;
    }
    config.validate().context("Invalid configuration")?;

    let synthesizer = tts::create_synthesizer(&config)?;
    synthesizer
        .verify()
        .await
        .context("Speech provider rejected the configured credentials")?;

    let sound_engine = if config.play_audio {
        Some(SoundEngine::new()?)
    } else {
        info!("🔇 Playback disabled");
        None
    };
    let player: Arc<dyn AudioPlayer> = match &sound_engine {
        Some(engine) => Arc::new(engine.clone()),
        None => Arc::new(MutedPlayer),
    };

    let mut pipeline = PipelineContext::new(
        config.voice_id.clone(),
        EmissionLedger::new(config.ledger_path()),
        ArtifactCache::new(config.cache_dir()),
        synthesizer,
        player,
    );
    if let Some(path) = config.history_log() {
        pipeline = pipeline.with_history(HistoryLog::new(path));
    }

    let backend: WatchBackend = config.watch_backend.parse()?;
    let mut watch_loop = WatchLoop::new(config.journal_dir(), pipeline).with_backend(
        backend,
        Duration::from_millis(config.poll_interval_ms.max(50)),
    );

    if args.once {
        match watch_loop.scan().await? {
            None => warn!("No journal found in {}", config.journal_dir),
            Some(RunOutcome::Emitted { line, .. }) => {
                info!("✅ Spoke '{}'", line.text);
                if let Some(engine) = &sound_engine {
                    engine.drain().await?;
                }
            }
            Some(outcome) => info!("Nothing new to say ({:?})", outcome),
        }
        return Ok(());
    }

    info!("✅ Elite Voices ready - waiting for NPC chatter");
    watch_loop
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Could not listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await?;

    if let Some(engine) = &sound_engine {
        engine.stop()?;
    }
    info!("👋 Elite Voices stopped");
    Ok(())
}
