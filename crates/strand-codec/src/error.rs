use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("tag mismatch: expected {expected}, found {found}")]
    TagMismatch { expected: String, found: String },

    #[error("unsupported codec version {0}")]
    UnsupportedVersion(u8),

    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("tag too long: {0} bytes")]
    TagTooLong(usize),

    #[error("framing error: {0}")]
    FramingError(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),
}

pub type CodecResult<T> = Result<T, CodecError>;
