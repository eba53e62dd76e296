// Command module - AT command interpretation
pub mod intent;
pub mod parser;

pub use intent::Intent;
pub use parser::{CommandInterpreter, ParsedCommand, ESCAPE_SEQUENCE};

/// Fixed result strings written to the client
pub mod responses {
    pub const OK: &str = "OK\r\n";
    pub const ERROR: &str = "ERROR\r\n";
    pub const NO_CARRIER: &str = "NO CARRIER\r\n";
    pub const BUSY: &str = "BUSY\r\n";
    pub const CONNECT: &str = "CONNECT 57600\r\n";
    pub const READY: &str = "Ready\r\n";
}
