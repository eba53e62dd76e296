// Session module - Per-client modem state machine
pub mod session;
pub mod state;

pub use session::ModemSession;
pub use state::{ModemMode, SessionState, SessionStatistics};
