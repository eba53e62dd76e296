// Infrastructure module - External dependencies and adapters
pub mod audio;
pub mod config;
pub mod logging;
pub mod tcp;
