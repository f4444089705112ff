//! # Centralized Error Handling
//!
//! Unified error types for the entire crate using `thiserror`.

use thiserror::Error;

/// Main error type for pedphase operations
#[derive(Error, Debug)]
pub enum PedPhaseError {
    /// No inheritance pattern admits a finite-cost partitioning for some
    /// column; the pedigree genotypes cannot be reconciled with the reads.
    #[error("Mendelian conflict: no consistent inheritance and allele assignment exists")]
    MendelianConflict,

    /// Internal assertion failures (missing checkpoint tables, projection
    /// size mismatches). These indicate a bug in the engine.
    #[error("Invariant violation: {message}")]
    InvariantViolation { message: String },

    /// Caller-supplied data is malformed (length mismatches, unknown
    /// samples, non-dense read IDs). Reported at construction.
    #[error("Precondition violation: {message}")]
    Precondition { message: String },
}

/// Type alias for Results using PedPhaseError
pub type Result<T> = std::result::Result<T, PedPhaseError>;

impl PedPhaseError {
    /// Create an invariant violation with a message
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::InvariantViolation {
            message: message.into(),
        }
    }

    /// Create a precondition violation with a message
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition {
            message: message.into(),
        }
    }
}
