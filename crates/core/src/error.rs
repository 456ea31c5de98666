//! Error types for the polykv storage engine.
//!
//! Per spec §4.9/§7, the C original surfaces errors through an owning
//! out-parameter string. Design Notes §9 licenses replacing that with "a
//! result type carrying a small enum discriminant plus a message" in a
//! systems-language reimplementation — that's `Error` below. Every fallible
//! public operation returns [`Result`]; on `Err` the caller must treat any
//! other outputs as unspecified (spec §7, Policy).

use thiserror::Error;

/// Result type alias used throughout the engine.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type, one variant per category from spec §7.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed parameter record: missing required outputs, both
    /// `transaction` and `snapshot` supplied, a non-existent snapshot id, an
    /// unknown option combination, etc.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The database or transaction handle was not initialized.
    #[error("uninitialized state: {0}")]
    UninitializedState(String),

    /// The operation is not supported by the active substrate (e.g. named
    /// collections on a substrate advertising no native collection support
    /// and refusing the key-prefix fallback).
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// I/O, corruption, or engine-specific failure from the substrate.
    #[error("substrate error: {0}")]
    Substrate(String),

    /// Transaction validation failed: a watched key's generation changed, or
    /// its presence changed, since it was read.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Arena or system allocation failure.
    #[error("out of memory: {0}")]
    OutOfMemory(String),
}

impl Error {
    /// Shorthand for [`Error::InvalidArgument`].
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Shorthand for [`Error::UninitializedState`].
    pub fn uninitialized(msg: impl Into<String>) -> Self {
        Error::UninitializedState(msg.into())
    }

    /// Shorthand for [`Error::NotImplemented`].
    pub fn not_implemented(msg: impl Into<String>) -> Self {
        Error::NotImplemented(msg.into())
    }

    /// Shorthand for [`Error::Substrate`].
    pub fn substrate(msg: impl Into<String>) -> Self {
        Error::Substrate(msg.into())
    }

    /// Shorthand for [`Error::Conflict`].
    pub fn conflict(msg: impl Into<String>) -> Self {
        Error::Conflict(msg.into())
    }

    /// `true` for categories a caller may reasonably retry (only conflicts;
    /// spec §7 — "Transactions do not auto-retry" is a policy for this crate,
    /// not a claim that retrying is never valid for the caller).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }
}
