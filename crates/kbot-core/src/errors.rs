use std::time::Duration;

/// Core error type for the bot.
///
/// Adapter crates map their specific errors into this type so the router can
/// decide between a user-facing reply and an operator-facing log line.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("generator error: {0}")]
    Generator(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("knowledge base error: {0}")]
    Knowledge(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
