use crate::cli::args::{Args, Command, ConfigCommand, PhonebookCommand, ServeArgs};
use crate::cli::output::{ConsoleWriter, Lookup, OutputWriter};
use crate::core::phonebook::PhonebookResolver;
use crate::domain::config::ModemConfig;
use crate::domain::error::ModemResult;
use crate::infrastructure::audio::audio_from_config;
use crate::infrastructure::config::ConfigManager;
use crate::infrastructure::logging::init_logging;
use crate::infrastructure::tcp::ModemServer;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Execute CLI command
pub async fn execute_command(args: Args) -> ModemResult<()> {
    let writer = ConsoleWriter::new(args.output.clone());

    let config_manager = ConfigManager::new()?;
    let config = if let Some(config_path) = &args.config {
        config_manager.load_config_from_path(Path::new(config_path))?
    } else {
        config_manager.load_config()?
    };

    if !args.quiet {
        init_logging(&config.modem.log_level, args.verbose)?;
    }

    match args.command {
        Command::Serve(serve_args) => execute_serve(serve_args, &writer, config).await,
        Command::Phonebook(phonebook_args) => {
            execute_phonebook_command(phonebook_args.command, &writer, &config)
        }
        Command::Config(config_args) => {
            execute_config_command(config_args.command, &writer, &config, &config_manager)
        }
        Command::Version => {
            writer.write_message(&format!("modemcom {}", env!("CARGO_PKG_VERSION")))?;
            Ok(())
        }
    }
}

/// Apply command line overrides to the loaded configuration
pub fn apply_serve_overrides(config: &mut ModemConfig, args: &ServeArgs) {
    if let Some(port) = args.port {
        config.modem.port = port;
    }
    if args.no_audio {
        config.audio.enabled = false;
    }
}

async fn execute_serve(
    args: ServeArgs,
    writer: &ConsoleWriter,
    mut config: ModemConfig,
) -> ModemResult<()> {
    apply_serve_overrides(&mut config, &args);

    for warning in config.validate()? {
        warn!("{}", warning);
    }

    let audio = audio_from_config(&config);
    let cancel = CancellationToken::new();
    let mut server = ModemServer::bind_with_cancel(config, audio, cancel.clone()).await?;

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, shutting down");
                shutdown.cancel();
            }
            Err(e) => warn!("Failed to listen for interrupt: {}", e),
        }
    });

    server.start()?;
    writer.write_message(&format!(
        "Modem listening on {} (Ctrl+C to stop)",
        server.bind_addr()
    ))?;

    server.wait().await;
    Ok(())
}

fn execute_phonebook_command(
    command: PhonebookCommand,
    writer: &ConsoleWriter,
    config: &ModemConfig,
) -> ModemResult<()> {
    match command {
        PhonebookCommand::List => {
            writer.write_phonebook(&config.phonebook)?;
            Ok(())
        }
        PhonebookCommand::Lookup { number } => {
            let resolver = PhonebookResolver::new(config.phonebook.clone());
            let plan = resolver.plan(&number);
            writer.write_lookup(&Lookup::new(&number, plan))?;
            Ok(())
        }
    }
}

fn execute_config_command(
    command: ConfigCommand,
    writer: &ConsoleWriter,
    config: &ModemConfig,
    config_manager: &ConfigManager,
) -> ModemResult<()> {
    match command {
        ConfigCommand::Show => {
            writer.write_config(config)?;
            Ok(())
        }
        ConfigCommand::Validate { file } => {
            let loaded;
            let target = match &file {
                Some(path) => {
                    loaded = config_manager.load_config_from_path(Path::new(path))?;
                    &loaded
                }
                None => config,
            };

            let warnings = target.validate()?;
            for warning in &warnings {
                writer.write_message(&format!("Warning: {}", warning))?;
            }
            writer.write_message(&format!(
                "Configuration is valid ({} phonebook entries, {} warnings)",
                target.phonebook.len(),
                warnings.len()
            ))?;
            Ok(())
        }
        ConfigCommand::Init { path } => {
            let dir = match path {
                Some(path) => PathBuf::from(path),
                None => std::env::current_dir()?,
            };
            let written = config_manager.init_project_config(&dir)?;
            writer.write_message(&format!("Created {}", written.display()))?;
            Ok(())
        }
    }
}
