//! Error types for the Gemini client

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// HTTP transport failure
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// SSE stream failure
    #[error("stream error: {0}")]
    Sse(String),

    /// Failed to decode a response payload
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error reported by the API itself
    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },

    /// No usable API key
    #[error("missing or invalid API key")]
    InvalidApiKey,

    /// Response shape did not match expectations
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl Error {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Error::Api {
            status,
            message: message.into(),
        }
    }

    pub fn sse(message: impl Into<String>) -> Self {
        Error::Sse(message.into())
    }
}
