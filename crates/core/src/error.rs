//! Error types for rulekey-core

use thiserror::Error;

/// Errors that can occur when parsing the textual form of a digest.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HashParseError {
    #[error("expected {expected} hex characters, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("digest contains non-hex characters")]
    InvalidHex,
}
