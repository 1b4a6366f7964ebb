//! Error types for identification parsing and classification

use thiserror::Error;

/// Reasons an identification line could not be decoded
///
/// Every variant corresponds to a `Malformed` probe outcome: a device answered,
/// but not with something this host understands.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Nothing left after trimming
    #[error("empty line")]
    Empty,

    /// Line contains bytes outside 7-bit ASCII
    #[error("line is not ASCII")]
    NotAscii,

    /// Line exceeds the maximum identification length
    #[error("line too long: {0} bytes")]
    TooLong(usize),

    /// No `:` between family prefix and kind
    #[error("missing ':' separator in {0:?}")]
    MissingSeparator(String),

    /// Prefix is not a registered device family
    #[error("unknown device family: {0:?}")]
    UnknownFamily(String),

    /// Kind segment is empty
    #[error("empty device kind")]
    EmptyKind,

    /// Index suffix is zero or out of range
    #[error("invalid device index: {0:?}")]
    InvalidIndex(String),
}

/// Errors raised while classifying a decoded response
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClassifyError {
    /// The kind is not in the classifier's registered set
    #[error("unrecognized device kind: {0}")]
    UnknownKind(String),
}
