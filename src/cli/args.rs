use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

/// Command line arguments for ModemCom
#[derive(Parser, Debug)]
#[command(
    name = "modemcom",
    version = env!("CARGO_PKG_VERSION"),
    about = "Hayes AT modem emulator bridging a TCP client to phonebook routes",
    long_about = "Emulates a dial-up modem on a loopback TCP port. AT commands are interpreted locally; dialing a number from the phonebook bridges the client to the configured TCP endpoint."
)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress logging
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path, replacing the global and project files
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text", global = true)]
    pub output: OutputFormat,

    /// Command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the modem emulator
    Serve(ServeArgs),
    /// Phonebook commands
    Phonebook(PhonebookArgs),
    /// Configuration management commands
    Config(ConfigArgs),
    /// Display version information
    Version,
}

/// Output format options
#[derive(ValueEnum, Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Human-readable text output
    #[default]
    Text,
    /// JSON output
    Json,
    /// Table output
    Table,
}

/// Emulator arguments
#[derive(ClapArgs, Debug)]
pub struct ServeArgs {
    /// Listen port, overriding the configuration
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Disable sound cues
    #[arg(long)]
    pub no_audio: bool,
}

/// Phonebook arguments
#[derive(ClapArgs, Debug)]
pub struct PhonebookArgs {
    /// Phonebook subcommand
    #[command(subcommand)]
    pub command: PhonebookCommand,
}

/// Configuration management arguments
#[derive(ClapArgs, Debug)]
pub struct ConfigArgs {
    /// Configuration subcommand
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Phonebook subcommands
#[derive(Subcommand, Debug)]
pub enum PhonebookCommand {
    /// List all phonebook entries
    List,
    /// Show what dialing a number would do
    Lookup {
        /// Number as it would be dialed
        number: String,
    },
}

/// Configuration management subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show current configuration
    Show,
    /// Validate configuration
    Validate {
        /// Configuration file path
        file: Option<String>,
    },
    /// Create a starter project configuration
    Init {
        /// Directory to create `.modemcom/config.toml` in
        #[arg(short, long)]
        path: Option<String>,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Serve(_) => "serve",
            Command::Phonebook(_) => "phonebook",
            Command::Config(_) => "config",
            Command::Version => "version",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Table => write!(f, "table"),
        }
    }
}
