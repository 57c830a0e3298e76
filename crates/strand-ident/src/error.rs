/// Errors from identity derivation.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IdentError {
    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type IdentResult<T> = Result<T, IdentError>;
