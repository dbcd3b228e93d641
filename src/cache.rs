//! Content-keyed audio cache.
//!
//! A line's text names its audio file. If the file exists the provider is
//! never asked again for that text.

use std::fs;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::error::{VoiceError, VoiceResult};
use crate::ledger::write_atomic;
use crate::tts::SpeechSynthesizer;

/// Extension of every cached artifact
pub const ARTIFACT_EXTENSION: &str = "mp3";

/// Characters that are not allowed in file names on at least one platform
const UNSAFE_CHARS: [char; 9] = ['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Longest file stem kept verbatim, in bytes
const MAX_STEM_BYTES: usize = 200;

/// Audio for one line of text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub audio: Vec<u8>,
    /// `true` when the file already existed and no synthesis happened
    pub cached: bool,
}

/// Strip characters that cannot appear in a file name.
///
/// Very long texts are cut at a character boundary and suffixed with an
/// MD5 of the full text so two long lines sharing a prefix stay distinct.
pub fn sanitize_file_name(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .filter(|c| !UNSAFE_CHARS.contains(c) && !c.is_control())
        .collect();
    let cleaned = cleaned.trim();

    if cleaned.len() <= MAX_STEM_BYTES {
        return cleaned.to_string();
    }

    let mut cut = MAX_STEM_BYTES;
    while !cleaned.is_char_boundary(cut) {
        cut -= 1;
    }
    format!(
        "{}-{:x}",
        cleaned[..cut].trim_end(),
        md5::compute(text.as_bytes())
    )
}

#[derive(Debug, Clone)]
pub struct ArtifactCache {
    dir: PathBuf,
}

impl ArtifactCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Where the artifact for `text` lives, or `None` if nothing speakable remains
    pub fn artifact_path(&self, text: &str) -> Option<PathBuf> {
        let stem = sanitize_file_name(text);
        if stem.is_empty() {
            return None;
        }
        Some(self.dir.join(format!("{}.{}", stem, ARTIFACT_EXTENSION)))
    }

    /// Load the cached audio for `text`, synthesizing it on a miss
    pub async fn resolve(
        &self,
        text: &str,
        voice_id: &str,
        synthesizer: &dyn SpeechSynthesizer,
    ) -> VoiceResult<Artifact> {
        let path = self.artifact_path(text).ok_or(VoiceError::EmptyText)?;

        if path.is_file() {
            debug!("💾 Cache hit: {}", path.display());
            let audio = fs::read(&path)?;
            return Ok(Artifact {
                path,
                audio,
                cached: true,
            });
        }

        let audio = synthesizer
            .synthesize(text, voice_id)
            .await
            .map_err(|e| VoiceError::Synthesis(format!("{:#}", e)))?;

        fs::create_dir_all(&self.dir)?;
        write_atomic(&path, &audio)?;
        info!("💾 Cached {} bytes at {}", audio.len(), path.display());

        Ok(Artifact {
            path,
            audio,
            cached: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct CountingSynth {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl SpeechSynthesizer for CountingSynth {
        async fn synthesize(&self, text: &str, _voice_id: &str) -> anyhow::Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("provider down");
            }
            Ok(text.as_bytes().to_vec())
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    #[test]
    fn test_sanitize_removes_each_unsafe_char() {
        for c in UNSAFE_CHARS {
            let name = sanitize_file_name(&format!("left{}right", c));
            assert_eq!(name, "leftright", "failed for {:?}", c);
        }
        assert_eq!(
            sanitize_file_name("You've got no right to scan me, officer!"),
            "You've got no right to scan me, officer!"
        );
        assert_eq!(sanitize_file_name("line\none\t"), "lineone");
    }

    #[test]
    fn test_sanitize_long_text_is_bounded() {
        let long = "é".repeat(300);
        let name = sanitize_file_name(&long);
        assert!(name.len() <= MAX_STEM_BYTES + 33);
        assert_ne!(name, sanitize_file_name(&format!("{}x", long)));
    }

    #[test]
    fn test_artifact_path_for_unsafe_only_text() {
        let cache = ArtifactCache::new("/tmp/audio");
        assert_eq!(cache.artifact_path("???"), None);
        assert_eq!(cache.artifact_path(""), None);
        assert_eq!(
            cache.artifact_path("Halt: scan!"),
            Some(PathBuf::from("/tmp/audio/Halt scan!.mp3"))
        );
    }

    #[tokio::test]
    async fn test_at_most_once_synthesis() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::new(dir.path().join("audio"));
        let synth = CountingSynth::default();

        let first = cache.resolve("Hello there", "v", &synth).await.unwrap();
        assert!(!first.cached);
        for _ in 0..3 {
            let again = cache.resolve("Hello there", "v", &synth).await.unwrap();
            assert!(again.cached);
            assert_eq!(again.audio, first.audio);
        }
        assert_eq!(synth.calls.load(Ordering::SeqCst), 1);
        assert!(cache.artifact_path("Hello there").unwrap().is_file());
    }

    #[tokio::test]
    async fn test_removed_artifact_is_resynthesized() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::new(dir.path());
        let synth = CountingSynth::default();

        let artifact = cache.resolve("Hello", "v", &synth).await.unwrap();
        fs::remove_file(&artifact.path).unwrap();
        cache.resolve("Hello", "v", &synth).await.unwrap();
        assert_eq!(synth.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_empty_text_skips_provider() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::new(dir.path());
        let synth = CountingSynth::default();

        let err = cache.resolve("  ", "v", &synth).await.unwrap_err();
        assert!(matches!(err, VoiceError::EmptyText));
        assert_eq!(synth.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_provider_failure_leaves_no_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::new(dir.path());
        let synth = CountingSynth {
            fail: true,
            ..Default::default()
        };

        let err = cache.resolve("Hello", "v", &synth).await.unwrap_err();
        assert!(matches!(err, VoiceError::Synthesis(_)));
        assert!(!cache.artifact_path("Hello").unwrap().exists());
    }
}
