// Core module - Modem behavior independent of sockets and processes
pub mod audio;
pub mod command;
pub mod phonebook;
pub mod session;
