// Logging module - Logging infrastructure
use crate::domain::error::{ModemError, ModemResult};
use std::io;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter directive for a configured level. `RUST_LOG` takes precedence.
pub fn filter_directive(level: &str, verbose: bool) -> String {
    let level = if verbose {
        "debug"
    } else {
        match level.to_ascii_lowercase().as_str() {
            "error" => "error",
            "warn" | "warning" => "warn",
            "debug" => "debug",
            "trace" => "trace",
            _ => "info",
        }
    };
    format!("modemcom={},warn", level)
}

/// Initialize logging system
pub fn init_logging(level: &str, verbose: bool) -> ModemResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(level, verbose)));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(verbose)
                .with_level(true)
                .with_thread_ids(false)
                .with_file(verbose)
                .with_line_number(verbose),
        )
        .try_init()
        .map_err(|e| ModemError::Config {
            message: format!("Failed to initialize logging: {}", e),
        })?;

    tracing::debug!("ModemCom logging system initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directive() {
        assert_eq!(filter_directive("info", false), "modemcom=info,warn");
        assert_eq!(filter_directive("WARNING", false), "modemcom=warn,warn");
        assert_eq!(filter_directive("bogus", false), "modemcom=info,warn");
        assert_eq!(filter_directive("error", true), "modemcom=debug,warn");
    }

    #[test]
    fn test_logging_init_once() {
        let _ = init_logging("info", false);
        // The global subscriber can only be installed once
        assert!(init_logging("debug", true).is_err());
    }
}
