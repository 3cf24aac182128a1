//! Error types for codec operations

use thiserror::Error;

/// Error type for codec operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("unexpected end of buffer")]
    EndOfBuffer,
    #[error("extra data found: {0} bytes")]
    ExtraData(usize),
    #[error("invalid data in {0}: {1}")]
    InvalidData(String, String), // context, message
    #[error("const mismatch: expected {expected}, found {found}")]
    ConstMismatch { expected: String, found: String },
    #[error("missing value for `{0}`")]
    MissingValue(String),
    #[error("value {0} out of range for {1}")]
    ValueOutOfRange(i128, &'static str),
    #[error("length mismatch: found {0}, expected {1}")]
    LengthMismatch(usize, usize), // found, expected
    #[error("invalid bool")]
    InvalidBool,
    #[error("invalid bit value: {0}")]
    InvalidBits(u8),
    #[error("unknown path `{0}`")]
    UnknownPath(String),
    #[error("unknown enumeration label `{0}`")]
    UnknownLabel(String),
    #[error("none of the union alternatives were found in the value")]
    NoUnionAlternative,
    #[error("invalid value: expected {expected}, found {found}")]
    InvalidValue {
        expected: &'static str,
        found: &'static str,
    },
}
