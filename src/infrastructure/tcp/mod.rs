// TCP module - Client listener and upstream bridge
pub mod bridge;
pub mod server;

pub use bridge::{BridgeEvent, UpstreamBridge};
pub use server::{ModemServer, ServerStats, SessionGuard, SessionSlot};
