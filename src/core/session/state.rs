use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest command line kept; further characters are dropped
pub const MAX_LINE_LENGTH: usize = 255;

/// Modem operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModemMode {
    /// Input is interpreted as AT commands
    Command,
    /// A dial attempt is in progress
    Dialing,
    /// Input and output are forwarded to the upstream connection
    Connected,
    /// The dialed number has no route; reported before returning to Command
    Busy,
}

impl fmt::Display for ModemMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModemMode::Command => write!(f, "command"),
            ModemMode::Dialing => write!(f, "dialing"),
            ModemMode::Connected => write!(f, "connected"),
            ModemMode::Busy => write!(f, "busy"),
        }
    }
}

/// Mode, flags and line buffer of one modem session
#[derive(Debug, Clone)]
pub struct SessionState {
    mode: ModemMode,
    echo_enabled: bool,
    verbose_enabled: bool,
    line: String,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            mode: ModemMode::Command,
            echo_enabled: true,
            verbose_enabled: true,
            line: String::new(),
        }
    }

    pub fn mode(&self) -> ModemMode {
        self.mode
    }

    /// Switch mode; a pending line does not survive leaving command mode
    pub fn set_mode(&mut self, mode: ModemMode) {
        if mode != ModemMode::Command {
            self.line.clear();
        }
        self.mode = mode;
    }

    pub fn is_online(&self) -> bool {
        self.mode == ModemMode::Connected
    }

    pub fn echo_enabled(&self) -> bool {
        self.echo_enabled
    }

    pub fn set_echo(&mut self, enabled: bool) {
        self.echo_enabled = enabled;
    }

    /// Tracked for ATV; result codes are always verbose
    pub fn verbose_enabled(&self) -> bool {
        self.verbose_enabled
    }

    pub fn set_verbose(&mut self, enabled: bool) {
        self.verbose_enabled = enabled;
    }

    /// Append a character to the command line. Returns false outside
    /// command mode or when the line is full.
    pub fn push_char(&mut self, c: char) -> bool {
        if self.mode != ModemMode::Command || self.line.len() >= MAX_LINE_LENGTH {
            return false;
        }
        self.line.push(c);
        true
    }

    /// Remove the last character, returning whether one was removed
    pub fn backspace(&mut self) -> bool {
        self.mode == ModemMode::Command && self.line.pop().is_some()
    }

    /// Take the completed line, if any
    pub fn take_line(&mut self) -> Option<String> {
        if self.mode != ModemMode::Command || self.line.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.line))
    }

    pub fn pending_line(&self) -> &str {
        &self.line
    }
}

/// Counters reported when a session ends
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatistics {
    /// Command lines handed to the interpreter
    pub commands: u64,
    /// ATD commands executed
    pub dial_attempts: u64,
    /// Dial attempts that reached CONNECT
    pub connections: u64,
    /// Bytes forwarded from the client to the upstream endpoint
    pub bytes_upstream: u64,
    /// Bytes relayed from the upstream endpoint to the client
    pub bytes_downstream: u64,
}
