use thiserror::Error;

/// ModemCom unified error type
#[derive(Error, Debug)]
pub enum ModemError {
    #[error("Network error: {0}")]
    Network(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Session error: {message}")]
    Session { message: String },

    #[error("Invalid route: {0}")]
    InvalidRoute(String),

    #[error("Output error: {0}")]
    Output(String),
}

pub type ModemResult<T> = Result<T, ModemError>;
