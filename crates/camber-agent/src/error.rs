//! Error types for the session layer

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Error from the Gemini client
    #[error(transparent)]
    Ai(#[from] camber_ai::Error),

    /// Compiler adapter fault. Ordinary compile diagnostics are data, not
    /// errors; this covers the adapter itself breaking.
    #[error("compiler error: {0}")]
    Compiler(String),

    /// Snapshot capture or mesh export failure
    #[error("render error: {0}")]
    Render(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn compiler(message: impl Into<String>) -> Self {
        Error::Compiler(message.into())
    }

    pub fn render(message: impl Into<String>) -> Self {
        Error::Render(message.into())
    }

    pub fn other(message: impl Into<String>) -> Self {
        Error::Other(message.into())
    }
}
