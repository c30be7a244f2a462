//! Error types for network construction and inference.

use thiserror::Error;

/// Errors surfaced by the network and the inference algorithms.
///
/// Mutating operations either complete fully or return one of these without
/// any observable change to the hierarchy.
#[derive(Debug, Error)]
pub enum SbmError {
    /// A request that contradicts the model's rules: unknown id or type,
    /// non-adjacent parent levels, more blocks than nodes, a disallowed
    /// edge type, collapsing below one block per type without exhaustive
    /// mode.
    #[error("logic error: {0}")]
    Logic(String),

    /// A reference to a level (or an ancestor beyond the top level) that
    /// does not exist.
    #[error("range error: {0}")]
    Range(String),
}

impl SbmError {
    pub(crate) fn logic(msg: impl Into<String>) -> Self {
        SbmError::Logic(msg.into())
    }

    pub(crate) fn range(msg: impl Into<String>) -> Self {
        SbmError::Range(msg.into())
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, SbmError>;
