//! Error types for the OpenSCAD adapter

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed STL: {0}")]
    MalformedStl(String),

    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),
}

impl Error {
    pub fn malformed(message: impl Into<String>) -> Self {
        Error::MalformedStl(message.into())
    }
}
