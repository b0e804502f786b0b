use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TypesError {
    #[error("File fingerprint {0} is not below the proof field modulus")]
    FingerprintOutOfField(String),

    #[error("File locator must not be empty")]
    EmptyLocator,

    #[error("Invalid time configuration: {0}")]
    InvalidTimeConfig(String),

    #[error("Invalid identifier: {0}")]
    InvalidId(String),
}

pub type Result<T> = std::result::Result<T, TypesError>;
