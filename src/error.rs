//! Error handling for the position ledger
//!
//! The library reports failures through [`LedgerError`] so callers can tell
//! user-correctable problems (validation, insufficient quantity) from
//! retryable ones (stale version on save). The CLI wraps these in `anyhow`
//! for context chaining.

use rust_decimal::Decimal;
use thiserror::Error;

/// Core error types for ledger and portfolio operations
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("insufficient quantity for {symbol}: selling {requested} units but only {available} held")]
    InsufficientQuantity {
        symbol: String,
        requested: Decimal,
        available: Decimal,
    },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("concurrent modification of position {position_id}: expected version {expected_version}")]
    Concurrency {
        position_id: i64,
        expected_version: i64,
    },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LedgerError {
    /// Whether the boundary layer may reload and reapply the operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Concurrency { .. })
    }
}

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;
