use std::fmt;

/// Action requested by a parsed command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// ATZ, AT&F
    Reset,
    /// ATD with the cleaned-up number
    Dial(String),
    /// ATH, or an S-register line carrying a hang-up
    Hangup,
    /// ATE0 / ATE1
    SetEcho(bool),
    /// ATV0 / ATV1
    SetVerbose(bool),
    /// +++ typed as a line
    Escape,
    /// ATO
    GoOnline,
    /// Acknowledged command with no effect on the session
    Unknown,
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Intent::Reset => write!(f, "reset"),
            Intent::Dial(number) => write!(f, "dial {}", number),
            Intent::Hangup => write!(f, "hangup"),
            Intent::SetEcho(on) => write!(f, "echo {}", if *on { "on" } else { "off" }),
            Intent::SetVerbose(on) => write!(f, "verbose {}", if *on { "on" } else { "off" }),
            Intent::Escape => write!(f, "escape"),
            Intent::GoOnline => write!(f, "online"),
            Intent::Unknown => write!(f, "unknown"),
        }
    }
}
