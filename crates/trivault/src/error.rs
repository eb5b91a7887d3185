//! Store error types.
//!
//! All subsystems surface errors through [`StoreError`], which is the single
//! error type returned by every public API in this crate.  Each variant
//! carries enough context for callers to decide how to handle the failure
//! without inspecting opaque strings.
//!
//! Replica disagreement is deliberately *not* an error: a successful read
//! reports it through [`Consistency`](crate::replica::Consistency) alongside
//! the value.

use crate::value::TypeTag;

/// Unified error type for the trivault secure store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    // -- Lookup errors ------------------------------------------------------
    /// No replica yielded a valid envelope for the requested key.
    #[error("data key not found: {data_key}")]
    NotFound { data_key: String },

    /// A valid envelope exists but its type tag or value text disagrees with
    /// the requested type.
    #[error("type mismatch for `{data_key}`: expected {expected}")]
    TypeMismatch { data_key: String, expected: TypeTag },

    // -- Input validation ---------------------------------------------------
    /// The data key cannot be used as a filename component.
    #[error("invalid data key: {reason}")]
    InvalidDataKey { reason: String },

    /// The module path would escape the replica bases or is malformed.
    #[error("invalid module path: {reason}")]
    InvalidModulePath { reason: String },

    // -- Environment errors -------------------------------------------------
    /// The platform provider could not supply user name, machine id, or base
    /// paths.  Raised at construction only.
    #[error("platform capability unavailable: {reason}")]
    CapabilityFailure { reason: String },

    /// Random salt generation failed (system CSPRNG error).
    #[error("encryption failed: {reason}")]
    EncryptionFailed { reason: String },

    /// An operation failed on all three replica bases.  Single-replica
    /// failures are absorbed and logged; only total failure surfaces.
    #[error("all replicas failed during {operation}")]
    ReplicasFailed { operation: &'static str },

    /// I/O error from the filesystem.  Propagated only where total failure
    /// is already established (e.g. no base tree could be removed during
    /// [`delete_all`](crate::SecureStore::delete_all)); per-replica I/O
    /// failures are absorbed, not surfaced here.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
