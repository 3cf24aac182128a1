//! Error types for binding operations

use thiserror::Error;

/// Error type for binding operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },
    #[error("field `{name}` of `{record}` collides with a reserved name")]
    NameCollision { name: String, record: &'static str },
    #[error("`{0}` is already registered")]
    AlreadyRegistered(&'static str),
    #[error("configuration conflict: {0}")]
    ConfigurationConflict(String),
    #[error("missing field `{field}` for `{record}`")]
    MissingField { record: &'static str, field: String },
    #[error(transparent)]
    Codec(#[from] structbind_codec::Error),
}

impl Error {
    pub(crate) fn mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Error::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }
}
