use crate::domain::error::{ModemError, ModemResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Well-known sound cue names
pub mod cues {
    pub const DIALTONE: &str = "dialtone";
    pub const BUSY: &str = "busy";
    pub const MODEM_NOISE: &str = "modem_noise";
    pub const CONNECT_SUCCESS: &str = "connect_success";
    pub const CONNECT_FAILED: &str = "connect_failed";

    /// Cue name for the DTMF tone of a single digit
    pub fn tone(digit: char) -> Option<String> {
        digit.is_ascii_digit().then(|| format!("tone_{}", digit))
    }
}

/// ModemCom configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModemConfig {
    /// Listener and session settings
    #[serde(default)]
    pub modem: ModemSettings,
    /// DTMF pacing
    #[serde(default)]
    pub dial: DialTiming,
    /// Audio playback settings
    #[serde(default)]
    pub audio: AudioSettings,
    /// Named sound cues mapped to files
    #[serde(default)]
    pub sounds: BTreeMap<String, PathBuf>,
    /// Dialable numbers in lookup order
    #[serde(default)]
    pub phonebook: Vec<PhonebookEntry>,
}

/// Listener and session settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModemSettings {
    /// Loopback TCP port the emulator listens on
    #[serde(default = "default_port")]
    pub port: u16,
    /// Deadline for a single upstream connect attempt
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
    /// Default log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Identification line reported by ATI and the greeting
    #[serde(default = "default_banner")]
    pub banner: String,
}

/// Pauses used while playing back the dialed number
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialTiming {
    /// Pause after each digit tone
    #[serde(default = "default_tone_gap")]
    pub tone_gap_ms: u64,
    /// Pause for a space or hyphen in the number
    #[serde(default = "default_separator_gap")]
    pub separator_gap_ms: u64,
    /// Pause after the whole number has been played
    #[serde(default = "default_closing_gap")]
    pub closing_gap_ms: u64,
}

/// Audio playback settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioSettings {
    /// Play cues at all
    #[serde(default = "default_audio_enabled")]
    pub enabled: bool,
    /// Override for the platform playback command
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player: Option<String>,
    /// Directory relative cue paths are resolved against
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,
}

/// Phonebook entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhonebookEntry {
    /// Number as written in the configuration
    pub number: String,
    /// Upstream endpoint as "host:port"
    #[serde(default, alias = "route", skip_serializing_if = "Option::is_none")]
    pub route_to: Option<String>,
    /// Announce cue played when the number is dialed
    #[serde(default, alias = "announce", skip_serializing_if = "Option::is_none")]
    pub play: Option<String>,
}

// Default value functions
fn default_port() -> u16 {
    5000
}

fn default_connect_timeout() -> u64 {
    10_000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_banner() -> String {
    "ModemCom Hayes Emulator v1.0".to_string()
}

fn default_tone_gap() -> u64 {
    100
}

fn default_separator_gap() -> u64 {
    200
}

fn default_closing_gap() -> u64 {
    1000
}

fn default_audio_enabled() -> bool {
    true
}

fn default_base_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for ModemSettings {
    fn default() -> Self {
        Self {
            port: default_port(),
            connect_timeout_ms: default_connect_timeout(),
            log_level: default_log_level(),
            banner: default_banner(),
        }
    }
}

impl Default for DialTiming {
    fn default() -> Self {
        Self {
            tone_gap_ms: default_tone_gap(),
            separator_gap_ms: default_separator_gap(),
            closing_gap_ms: default_closing_gap(),
        }
    }
}

impl DialTiming {
    /// No pauses at all
    pub fn immediate() -> Self {
        Self {
            tone_gap_ms: 0,
            separator_gap_ms: 0,
            closing_gap_ms: 0,
        }
    }
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            enabled: default_audio_enabled(),
            player: None,
            base_dir: default_base_dir(),
        }
    }
}

impl ModemSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl PhonebookEntry {
    pub fn new(number: impl Into<String>) -> Self {
        Self {
            number: number.into(),
            route_to: None,
            play: None,
        }
    }

    pub fn with_route(mut self, route: impl Into<String>) -> Self {
        self.route_to = Some(route.into());
        self
    }

    pub fn with_announce(mut self, cue: impl Into<String>) -> Self {
        self.play = Some(cue.into());
        self
    }

    /// Route with empty strings treated as absent
    pub fn route(&self) -> Option<&str> {
        self.route_to.as_deref().filter(|r| !r.is_empty())
    }

    /// Announce cue with empty strings treated as absent
    pub fn announce(&self) -> Option<&str> {
        self.play.as_deref().filter(|p| !p.is_empty())
    }
}

impl ModemConfig {
    /// Check the configuration, returning warnings for problems that only
    /// surface when the affected number is dialed.
    pub fn validate(&self) -> ModemResult<Vec<String>> {
        let mut warnings = Vec::new();

        for (index, entry) in self.phonebook.iter().enumerate() {
            if entry.number.trim().is_empty() {
                return Err(ModemError::Config {
                    message: format!("Phonebook entry #{} has an empty number", index + 1),
                });
            }

            if let Some(route) = entry.route() {
                if let Err(e) = crate::core::phonebook::parse_route(route) {
                    warnings.push(format!("Phonebook entry '{}': {}", entry.number, e));
                }
            }
        }

        Ok(warnings)
    }
}
