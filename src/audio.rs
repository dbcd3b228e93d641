//! Playback of synthesized dialogue
//!
//! rodio's output stream is not `Send`, so [`SoundEngine`] owns it on a
//! dedicated audio thread and receives clips over a channel.

use anyhow::Result;
use async_trait::async_trait;
use std::io::Cursor;
use std::sync::mpsc;
use std::thread;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

/// Plays encoded audio
#[async_trait]
pub trait AudioPlayer: Send + Sync + std::fmt::Debug {
    /// Queue `audio` for playback
    async fn play(&self, audio: &[u8]) -> Result<()>;

    /// Get the player name
    fn name(&self) -> &str;
}

/// Commands sent to the audio thread
enum AudioCommand {
    Play(Vec<u8>, oneshot::Sender<Result<()>>),
    Drain(oneshot::Sender<()>),
    Stop,
}

/// Thread-safe handle to the audio thread
#[derive(Clone)]
pub struct SoundEngine {
    sender: mpsc::Sender<AudioCommand>,
}

impl std::fmt::Debug for SoundEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoundEngine").finish()
    }
}

impl SoundEngine {
    pub fn new() -> Result<Self> {
        let (sender, receiver) = mpsc::channel::<AudioCommand>();

        thread::Builder::new()
            .name("elite-voices-audio".to_string())
            .spawn(move || Self::audio_thread(receiver))?;

        Ok(Self { sender })
    }

    fn audio_thread(receiver: mpsc::Receiver<AudioCommand>) {
        use rodio::OutputStream;

        let (stream, stream_handle) = match OutputStream::try_default() {
            Ok(s) => s,
            Err(e) => {
                warn!("🔇 Failed to initialize audio output: {}", e);
                // Keep answering so callers see the failure instead of hanging
                while let Ok(cmd) = receiver.recv() {
                    match cmd {
                        AudioCommand::Play(_, resp) => {
                            let _ = resp.send(Err(anyhow::anyhow!("no audio output device")));
                        }
                        AudioCommand::Drain(resp) => {
                            let _ = resp.send(());
                        }
                        AudioCommand::Stop => {}
                    }
                }
                return;
            }
        };

        // Keep stream alive
        let _stream = stream;
        let mut sink = match rodio::Sink::try_new(&stream_handle) {
            Ok(s) => s,
            Err(e) => {
                error!("❌ Failed to create audio sink: {}", e);
                return;
            }
        };

        info!("🔊 Audio thread started");

        while let Ok(cmd) = receiver.recv() {
            match cmd {
                AudioCommand::Play(audio, resp) => {
                    let result = Self::queue_clip(&sink, audio);
                    if let Err(e) = &result {
                        error!("❌ Audio playback failed: {}", e);
                    }
                    let _ = resp.send(result);
                }
                AudioCommand::Drain(resp) => {
                    sink.sleep_until_end();
                    let _ = resp.send(());
                }
                AudioCommand::Stop => {
                    info!("🛑 Stopping all playback");
                    sink.stop();
                    if let Ok(new_sink) = rodio::Sink::try_new(&stream_handle) {
                        sink = new_sink;
                    }
                }
            }
        }

        // Let the last line finish before the stream is dropped
        sink.sleep_until_end();
        info!("🔇 Audio thread stopped");
    }

    fn queue_clip(sink: &rodio::Sink, audio: Vec<u8>) -> Result<()> {
        let len = audio.len();
        let source = rodio::Decoder::new(Cursor::new(audio))?;
        sink.append(source);
        debug!("🔊 Queued {} bytes", len);
        Ok(())
    }

    /// Wait until every queued line has finished playing
    pub async fn drain(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(AudioCommand::Drain(tx))
            .map_err(|e| anyhow::anyhow!("Audio thread disconnected: {}", e))?;
        rx.await
            .map_err(|_| anyhow::anyhow!("Audio thread dropped the request"))
    }

    /// Stop all current playback and clear the queue
    pub fn stop(&self) -> Result<()> {
        self.sender
            .send(AudioCommand::Stop)
            .map_err(|e| anyhow::anyhow!("Audio thread disconnected: {}", e))
    }
}

#[async_trait]
impl AudioPlayer for SoundEngine {
    async fn play(&self, audio: &[u8]) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(AudioCommand::Play(audio.to_vec(), tx))
            .map_err(|e| anyhow::anyhow!("Audio thread disconnected: {}", e))?;

        rx.await
            .map_err(|_| anyhow::anyhow!("Audio thread dropped the request"))?
    }

    fn name(&self) -> &str {
        "rodio"
    }
}

/// Player used when playback is switched off
#[derive(Debug, Default)]
pub struct MutedPlayer;

#[async_trait]
impl AudioPlayer for MutedPlayer {
    async fn play(&self, audio: &[u8]) -> Result<()> {
        debug!("🔇 Muted, skipping {} bytes of audio", audio.len());
        Ok(())
    }

    fn name(&self) -> &str {
        "muted"
    }
}
