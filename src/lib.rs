//! ModemCom Library
//!
//! Hayes AT modem emulator: a TCP client talks to a virtual modem, and
//! dialing a phonebook number bridges it to a TCP endpoint.

pub mod cli;
pub mod core;
pub mod domain;
pub mod infrastructure;

pub use crate::core::audio::{AudioCollaborator, SharedAudio, SilentAudio};
pub use crate::core::command::{CommandInterpreter, Intent, ParsedCommand};
pub use crate::core::phonebook::{DialPlan, PhonebookResolver};
pub use crate::core::session::{ModemMode, ModemSession, SessionStatistics};
pub use domain::config::{ModemConfig, PhonebookEntry};
pub use domain::error::{ModemError, ModemResult};
pub use infrastructure::tcp::ModemServer;
