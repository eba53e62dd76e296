use crate::core::audio::AudioCollaborator;
use crate::domain::config::AudioSettings;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Mutex;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Plays cues by spawning the platform's command line audio player.
///
/// Only one cue plays at a time; starting a new one stops the previous one.
pub struct ProcessAudioPlayer {
    sounds: BTreeMap<String, PathBuf>,
    base_dir: PathBuf,
    player: Option<String>,
    current: Mutex<Option<CancellationToken>>,
}

impl ProcessAudioPlayer {
    pub fn new(settings: &AudioSettings, sounds: BTreeMap<String, PathBuf>) -> Self {
        Self {
            sounds,
            base_dir: settings.base_dir.clone(),
            player: settings.player.clone(),
            current: Mutex::new(None),
        }
    }

    /// Map a cue name to a file: configured cues first, otherwise the name
    /// itself is taken as a path.
    pub fn resolve(&self, cue: &str) -> Option<PathBuf> {
        let path = match self.sounds.get(cue) {
            Some(path) if path.as_os_str().is_empty() => return None,
            Some(path) => path.clone(),
            None => PathBuf::from(cue),
        };

        if path.is_absolute() {
            Some(path)
        } else {
            Some(self.base_dir.join(path))
        }
    }

    fn command_for(&self, path: &Path) -> Option<Command> {
        if let Some(player) = &self.player {
            let mut parts = player.split_whitespace();
            let mut command = Command::new(parts.next()?);
            command.args(parts).arg(path);
            return Some(command);
        }

        if cfg!(target_os = "linux") {
            let mut command = Command::new("aplay");
            command.arg("-q").arg(path);
            Some(command)
        } else if cfg!(target_os = "macos") {
            let mut command = Command::new("afplay");
            command.arg(path);
            Some(command)
        } else if cfg!(windows) {
            let mut command = Command::new("powershell.exe");
            command.args(["-NoProfile", "-NonInteractive", "-Command"]).arg(format!(
                "(New-Object System.Media.SoundPlayer '{}').PlaySync()",
                path.display()
            ));
            Some(command)
        } else {
            None
        }
    }

    fn begin(&self) -> CancellationToken {
        self.stop();
        let token = CancellationToken::new();
        if let Ok(mut current) = self.current.lock() {
            *current = Some(token.clone());
        }
        token
    }
}

#[async_trait]
impl AudioCollaborator for ProcessAudioPlayer {
    async fn play(&self, cue: &str) -> bool {
        let Some(path) = self.resolve(cue) else {
            debug!("No sound configured for cue '{}'", cue);
            return false;
        };

        if !path.exists() {
            warn!("Audio file not found: {}", path.display());
            return false;
        }

        let Some(mut command) = self.command_for(&path) else {
            warn!("Unsupported platform for audio playback");
            return false;
        };

        let token = self.begin();

        let mut child = match command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                warn!("Failed to start audio playback for {}: {}", path.display(), e);
                return false;
            }
        };

        debug!("Playing audio: {}", path.display());

        tokio::select! {
            status = child.wait() => match status {
                Ok(status) => status.success(),
                Err(e) => {
                    warn!("Error waiting for audio playback of {}: {}", path.display(), e);
                    false
                }
            },
            _ = token.cancelled() => {
                if let Err(e) = child.kill().await {
                    warn!("Error stopping audio: {}", e);
                }
                false
            }
        }
    }

    fn stop(&self) {
        if let Ok(mut current) = self.current.lock() {
            if let Some(token) = current.take() {
                token.cancel();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn player_in(dir: &TempDir, player: Option<&str>) -> ProcessAudioPlayer {
        let settings = AudioSettings {
            enabled: true,
            player: player.map(str::to_string),
            base_dir: dir.path().to_path_buf(),
        };
        let mut sounds = BTreeMap::new();
        sounds.insert("dialtone".to_string(), PathBuf::from("dialtone.wav"));
        sounds.insert("silent".to_string(), PathBuf::new());
        ProcessAudioPlayer::new(&settings, sounds)
    }

    #[test]
    fn test_resolve_cues() {
        let dir = TempDir::new().unwrap();
        let player = player_in(&dir, None);

        assert_eq!(player.resolve("dialtone"), Some(dir.path().join("dialtone.wav")));
        assert_eq!(player.resolve("custom.wav"), Some(dir.path().join("custom.wav")));
        assert_eq!(player.resolve("silent"), None);
    }

    #[tokio::test]
    async fn test_missing_file_is_skipped() {
        let dir = TempDir::new().unwrap();
        let player = player_in(&dir, Some("true"));

        assert!(!player.play("dialtone").await);
        assert!(!player.play("silent").await);
    }

    #[test]
    fn test_stop_without_playback() {
        let dir = TempDir::new().unwrap();
        let player = player_in(&dir, None);
        player.stop();
        player.stop();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_player_exit_status() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("dialtone.wav"), b"RIFF").unwrap();

        assert!(player_in(&dir, Some("true")).play("dialtone").await);
        assert!(!player_in(&dir, Some("false")).play("dialtone").await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stop_interrupts_playback() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("dialtone.wav"), b"RIFF").unwrap();
        let player = Arc::new(player_in(&dir, Some("tail -f")));

        let playing = Arc::clone(&player);
        let handle = tokio::spawn(async move { playing.play("dialtone").await });

        tokio::time::sleep(Duration::from_millis(100)).await;
        player.stop();

        let result = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(!result);
    }
}
