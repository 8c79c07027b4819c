//! Error types for the crash symbolication engine.
//!
//! Every failure that can happen while resolving one address is represented
//! here. The fallback chain recovers all of them locally; only the aggregate
//! `NotFound` (or `NoModule`) ever reaches a caller of `resolve`.

use thiserror::Error;

use crate::formats::pe::PeError;
use crate::io::error::IoError;
use crate::platform::ProcessId;

/// Main error type for symbol resolution.
#[derive(Debug, Error)]
pub enum SymbolError {
    /// Module, function or line not located
    #[error("Symbol not found")]
    NotFound,

    /// Address is not inside any mapped module
    #[error("No module contains address {address:#x}")]
    NoModule { address: u64 },

    /// Process was never attached (or already detached)
    #[error("Unknown process {0}")]
    UnknownProcess(ProcessId),

    /// Header signatures or structures do not match expectations
    #[error("Bad image format: {0}")]
    BadFormat(String),

    /// A referenced table extends past the end of the mapped image
    #[error("Truncated image: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    /// File I/O or mapping errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed debug information
    #[error("DWARF error: {0}")]
    Dwarf(#[from] gimli::Error),
}

impl SymbolError {
    /// True for outcomes that simply mean "nothing here".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound | Self::NoModule { .. })
    }

    /// Whether the fallback chain may move on to the next source.
    ///
    /// Every variant is recoverable; corrupt modules just yield no symbols.
    pub fn is_recoverable(&self) -> bool {
        true
    }
}

impl From<PeError> for SymbolError {
    fn from(err: PeError) -> Self {
        match err {
            PeError::NotFound(_) => Self::NotFound,
            PeError::TruncatedHeader { expected, actual }
            | PeError::TruncatedTable {
                expected, actual, ..
            } => Self::Truncated { expected, actual },
            PeError::IoError(msg) => Self::Io(std::io::Error::other(msg)),
            other => Self::BadFormat(other.to_string()),
        }
    }
}

impl From<IoError> for SymbolError {
    fn from(err: IoError) -> Self {
        match err {
            IoError::StdIo(e) => Self::Io(e),
            other => Self::Io(std::io::Error::other(other.to_string())),
        }
    }
}

/// Result type alias for symbol resolution
pub type Result<T> = std::result::Result<T, SymbolError>;
