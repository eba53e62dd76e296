use super::intent::Intent;
use super::responses;
use tracing::{debug, info};

/// Escape sequence that drops an online session back to command mode
pub const ESCAPE_SEQUENCE: &str = "+++";

/// Characters a dial string may carry that are not part of the number
const DIAL_MODIFIERS: [char; 6] = ['W', 'P', 'T', ',', ';', '-'];

/// Result of interpreting one command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    /// Text to write back to the client, possibly empty
    pub response: String,
    /// Action for the session to carry out
    pub intent: Option<Intent>,
}

impl ParsedCommand {
    fn new(response: impl Into<String>, intent: Option<Intent>) -> Self {
        Self {
            response: response.into(),
            intent,
        }
    }

    fn ok(intent: Option<Intent>) -> Self {
        Self::new(responses::OK, intent)
    }
}

/// Hayes AT command line interpreter.
///
/// Stateless apart from the identification banner; every line is parsed on
/// its own and never fails. Input that is not an AT command yields `ERROR`,
/// AT commands outside the recognized set are acknowledged with `OK`.
#[derive(Debug, Clone)]
pub struct CommandInterpreter {
    banner: String,
}

impl CommandInterpreter {
    pub fn new(banner: impl Into<String>) -> Self {
        Self {
            banner: banner.into(),
        }
    }

    pub fn banner(&self) -> &str {
        &self.banner
    }

    /// Parse one command line
    pub fn parse(&self, raw: &str) -> ParsedCommand {
        let mut input = raw.trim().to_uppercase();

        if input.is_empty() {
            return ParsedCommand::new(String::new(), None);
        }

        info!("AT command received: {}", input);

        if input == ESCAPE_SEQUENCE {
            return ParsedCommand::ok(Some(Intent::Escape));
        }

        if input.starts_with("+++AT") {
            input = input[ESCAPE_SEQUENCE.len()..].to_string();
        }

        let command = match input.strip_prefix("AT") {
            Some(command) => command,
            None => {
                debug!("Rejected non-AT input: {}", input);
                return ParsedCommand::new(responses::ERROR, None);
            }
        };

        self.parse_command(command)
    }

    fn parse_command(&self, command: &str) -> ParsedCommand {
        match command {
            "Z" | "Z0" => return ParsedCommand::ok(Some(Intent::Reset)),
            "E0" => return ParsedCommand::ok(Some(Intent::SetEcho(false))),
            "E1" => return ParsedCommand::ok(Some(Intent::SetEcho(true))),
            "V0" => return ParsedCommand::ok(Some(Intent::SetVerbose(false))),
            "V1" => return ParsedCommand::ok(Some(Intent::SetVerbose(true))),
            // Quiet mode is acknowledged only
            "Q0" | "Q1" => return ParsedCommand::ok(Some(Intent::Unknown)),
            "H" | "H0" => return ParsedCommand::ok(Some(Intent::Hangup)),
            _ => {}
        }

        if command.starts_with('D') {
            return ParsedCommand::ok(Some(Intent::Dial(extract_number(command))));
        }

        // Answering is acknowledged only
        if command == "A" {
            return ParsedCommand::ok(Some(Intent::Unknown));
        }

        if command.starts_with('I') {
            return ParsedCommand::new(
                format!("{}\r\n{}", self.banner, responses::OK),
                None,
            );
        }

        if command.starts_with('X') {
            return ParsedCommand::ok(None);
        }

        if command.starts_with('S') {
            return ParsedCommand::ok(compound_hangup(command));
        }

        if command == "&F" || command == "&F0" {
            return ParsedCommand::ok(Some(Intent::Reset));
        }

        if command.starts_with("&D") || command.starts_with("&C") {
            return ParsedCommand::ok(None);
        }

        if command == "O" || command == "O0" {
            return ParsedCommand::new(responses::CONNECT, Some(Intent::GoOnline));
        }

        debug!("Acknowledging unrecognized command: AT{}", command);
        ParsedCommand::ok(None)
    }
}

/// Hang-up embedded in a compound S-register line such as `S0=0H0`
fn compound_hangup(command: &str) -> Option<Intent> {
    if command.contains("H0") || command.ends_with('H') {
        Some(Intent::Hangup)
    } else {
        None
    }
}

/// Strip the dial prefix and dial modifiers, leaving the number
fn extract_number(command: &str) -> String {
    let rest = command
        .strip_prefix("DT")
        .or_else(|| command.strip_prefix("DP"))
        .or_else(|| command.strip_prefix('D'))
        .unwrap_or(command);

    rest.chars()
        .filter(|c| !DIAL_MODIFIERS.contains(c))
        .collect::<String>()
        .trim()
        .to_string()
}
