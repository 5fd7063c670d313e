use erd_transport::{Erd, TransportError};
use thiserror::Error;

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Malformed field or registry definition. Raised only while building.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("duplicate field name: {0}")]
    DuplicateName(String),
    #[error("field name must not be empty")]
    EmptyName,
    #[error("unsupported width: {0} bytes")]
    InvalidWidth(usize),
    #[error("unsupported bit length: {0}")]
    InvalidBitLength(u32),
    #[error("unknown format: {0}")]
    UnknownFormat(String),
    #[error("duplicate sub-field: {0}")]
    DuplicateSubField(String),
    #[error("sub-field {0} lies outside the parent span")]
    SubFieldOutOfSpan(String),
    #[error("sub-field {0} overlaps another sub-field")]
    SubFieldOverlap(String),
    #[error("sub-field {0} must start on a byte boundary")]
    Unaligned(String),
    #[error("composite format has no sub-fields")]
    EmptyComposite,
    #[error("{count} fields starting at {base} run past 0xFFFF")]
    ErdOverflow { base: Erd, count: usize },
    #[error("invalid ERD: {0}")]
    InvalidErd(String),
}

/// Value does not fit the wire layout, or bytes do not match it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("expected {expected} bytes, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("value {value} outside [{min}, {max}]")]
    OutOfRange { value: i64, min: i64, max: i64 },
    #[error("unknown sub-field: {0}")]
    UnknownSubField(String),
    #[error("expected an integer value")]
    ExpectedScalar,
    #[error("expected a composite value")]
    ExpectedComposite,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error("transport failure on {name} ({erd}): {source}")]
    Transport {
        erd: Erd,
        name: String,
        #[source]
        source: TransportError,
    },
    #[error("field is read-only: {name}")]
    ReadOnly { name: String },
    #[error("no such field: {0}")]
    UnknownField(String),
}
