use thiserror::Error;

/// Version string written into every signed envelope.
pub const ENVELOPE_VERSION: &str = "1.0";

#[derive(Error, Debug)]
pub enum TesseraError {
    #[error("Image read error: {0}")]
    ImageRead(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Image encode error: {0}")]
    Encode(String),

    #[error("Key error: {0}")]
    Key(String),
}

impl From<serde_json::Error> for TesseraError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TesseraError>;
