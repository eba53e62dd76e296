use crate::cli::args::OutputFormat;
use crate::core::phonebook::{normalize_number, DialPlan};
use crate::domain::config::{ModemConfig, PhonebookEntry};
use serde::Serialize;
use std::io;
use tabled::{Table, Tabled};

/// Output writer trait for different formats
pub trait OutputWriter {
    fn write_phonebook(&self, entries: &[PhonebookEntry]) -> Result<(), OutputError>;
    fn write_lookup(&self, lookup: &Lookup) -> Result<(), OutputError>;
    fn write_config(&self, config: &ModemConfig) -> Result<(), OutputError>;
    fn write_message(&self, message: &str) -> Result<(), OutputError>;
}

/// Output formatting errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("TOML serialization error: {0}")]
    TomlError(#[from] toml::ser::Error),
}

impl From<OutputError> for crate::domain::error::ModemError {
    fn from(err: OutputError) -> Self {
        Self::Output(err.to_string())
    }
}

/// Result of `phonebook lookup`
#[derive(Debug, Clone, Serialize)]
pub struct Lookup {
    pub number: String,
    pub normalized: String,
    pub plan: DialPlan,
}

impl Lookup {
    pub fn new(number: &str, plan: DialPlan) -> Self {
        Self {
            number: number.to_string(),
            normalized: normalize_number(number),
            plan,
        }
    }
}

/// Console output writer
pub struct ConsoleWriter {
    format: OutputFormat,
}

impl ConsoleWriter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Render the phonebook without printing it
    pub fn render_phonebook(&self, entries: &[PhonebookEntry]) -> Result<String, OutputError> {
        let rendered = match self.format {
            OutputFormat::Text => {
                let mut out = String::new();
                for entry in entries {
                    out.push_str(&format!(
                        "{} -> {}",
                        entry.number,
                        entry.route().unwrap_or("(busy)")
                    ));
                    if let Some(announce) = entry.announce() {
                        out.push_str(&format!(" [announce: {}]", announce));
                    }
                    out.push('\n');
                }
                out
            }
            OutputFormat::Json => serde_json::to_string_pretty(entries)? + "\n",
            OutputFormat::Table => {
                if entries.is_empty() {
                    String::new()
                } else {
                    let rows: Vec<PhonebookTableRow> =
                        entries.iter().map(PhonebookTableRow::from).collect();
                    format!("{}\n", Table::new(rows))
                }
            }
        };
        Ok(rendered)
    }
}

impl OutputWriter for ConsoleWriter {
    fn write_phonebook(&self, entries: &[PhonebookEntry]) -> Result<(), OutputError> {
        if entries.is_empty() && self.format != OutputFormat::Json {
            println!("Phonebook is empty");
            return Ok(());
        }
        print!("{}", self.render_phonebook(entries)?);
        Ok(())
    }

    fn write_lookup(&self, lookup: &Lookup) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Text => {
                println!("{}: {}", lookup.number, lookup.plan);
                if let Some(announce) = lookup.plan.announce() {
                    println!("  Announce: {}", announce);
                }
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(lookup)?);
            }
            OutputFormat::Table => {
                let table = Table::new(vec![LookupTableRow::from(lookup)]);
                println!("{}", table);
            }
        }
        Ok(())
    }

    fn write_config(&self, config: &ModemConfig) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Text => {
                println!("ModemCom Configuration:");
                println!("  Port: {}", config.modem.port);
                println!("  Connect timeout: {}ms", config.modem.connect_timeout_ms);
                println!("  Log level: {}", config.modem.log_level);
                println!("  Banner: {}", config.modem.banner);
                println!(
                    "  Dial timing: {}ms tone, {}ms separator, {}ms closing",
                    config.dial.tone_gap_ms, config.dial.separator_gap_ms, config.dial.closing_gap_ms
                );
                println!(
                    "  Audio: {} (player: {}, base dir: {})",
                    if config.audio.enabled { "enabled" } else { "disabled" },
                    config.audio.player.as_deref().unwrap_or("platform default"),
                    config.audio.base_dir.display()
                );
                println!("  Sounds: {}", config.sounds.len());
                println!("  Phonebook entries: {}", config.phonebook.len());
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(config)?);
            }
            OutputFormat::Table => {
                print!("{}", toml::to_string_pretty(config)?);
            }
        }
        Ok(())
    }

    fn write_message(&self, message: &str) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "message": message,
                    "level": "info"
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            _ => {
                println!("{}", message);
            }
        }
        Ok(())
    }
}

/// Table row for a phonebook entry
#[derive(Tabled)]
struct PhonebookTableRow {
    number: String,
    route: String,
    announce: String,
}

impl From<&PhonebookEntry> for PhonebookTableRow {
    fn from(entry: &PhonebookEntry) -> Self {
        Self {
            number: entry.number.clone(),
            route: entry.route().unwrap_or("-").to_string(),
            announce: entry.announce().unwrap_or("-").to_string(),
        }
    }
}

/// Table row for a lookup result
#[derive(Tabled)]
struct LookupTableRow {
    number: String,
    normalized: String,
    result: String,
}

impl From<&Lookup> for LookupTableRow {
    fn from(lookup: &Lookup) -> Self {
        Self {
            number: lookup.number.clone(),
            normalized: lookup.normalized.clone(),
            result: lookup.plan.to_string(),
        }
    }
}
