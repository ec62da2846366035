//! Error types for the reconciliation core.

use thiserror::Error;

/// Result type alias for reconciliation operations.
pub type MigrateResult<T> = Result<T, MigrateError>;

/// Errors that can occur while diffing, planning, applying or tracking
/// migrations.
#[derive(Debug, Error)]
pub enum MigrateError {
    /// A document failed validation or normalization.
    #[error(transparent)]
    Schema(#[from] strata_schema::SchemaError),

    /// Rename histories could not be resolved to a one-to-one mapping.
    #[error("ambiguous rename for {entity}: {candidates:?} claim the same removed entity")]
    DiffAmbiguity {
        /// Entity whose rename claim collided.
        entity: String,
        /// The entities whose histories collide.
        candidates: Vec<String>,
    },

    /// Dependency ordering could not be satisfied. Always a modeling bug
    /// upstream, never a user input problem.
    #[error("planner invariant violated: {0}")]
    PlannerInvariant(String),

    /// A ledger entry's statements no longer hash to its recorded checksum.
    #[error("checksum mismatch for migration '{id}': expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Migration ID.
        id: String,
        /// Checksum recorded in the ledger.
        expected: String,
        /// Checksum recomputed from the statements.
        actual: String,
    },

    /// A statement failed after earlier statements in the plan succeeded.
    /// Never retried automatically; recovery is re-running reconciliation.
    #[error("statement {index} failed during apply: {reason}\n  statement: {statement}")]
    PartialApply {
        /// Zero-based index of the failing statement.
        index: usize,
        /// The failing statement text.
        statement: String,
        /// The executor's error message.
        reason: String,
    },

    /// Transient I/O failure talking to the live database, after retries
    /// were exhausted.
    #[error("connectivity failure after {attempts} attempt(s): {reason}")]
    Connectivity {
        /// How many attempts were made.
        attempts: u32,
        /// The last error observed.
        reason: String,
    },

    /// An unresolved pending ledger entry blocks a new recording.
    #[error("a pending migration '{0}' already exists; resolve it before applying another")]
    PendingEntryExists(String),

    /// No ledger entry with the given id.
    #[error("migration '{0}' not found in ledger")]
    EntryNotFound(String),

    /// Ledger storage failure.
    #[error("ledger error: {0}")]
    Ledger(String),

    /// Requested rollback is not possible.
    #[error("cannot rollback: {0}")]
    RollbackFailed(String),

    /// No schema changes detected.
    #[error("no schema changes detected")]
    NoChanges,
}

impl MigrateError {
    /// Create a planner invariant error.
    pub fn planner_invariant(msg: impl Into<String>) -> Self {
        Self::PlannerInvariant(msg.into())
    }

    /// Create a ledger error.
    pub fn ledger(msg: impl Into<String>) -> Self {
        Self::Ledger(msg.into())
    }

    /// Create a rollback error.
    pub fn rollback_failed(msg: impl Into<String>) -> Self {
        Self::RollbackFailed(msg.into())
    }

    /// Whether re-running reconciliation without other intervention can
    /// resolve this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::PartialApply { .. } | Self::Connectivity { .. } | Self::NoChanges
        )
    }
}

/// Errors an embedder's statement executor reports.
///
/// The split decides retry behavior: `Connectivity` failures are retried
/// with backoff, `Rejected` failures surface immediately as
/// [`MigrateError::PartialApply`]. The adapter picks the classification,
/// which keeps the retry boundary a policy choice rather than a hardcoded
/// error-type list.
#[derive(Debug, Clone, Error)]
pub enum ExecutionError {
    /// Timeout, connection reset, or similar transient failure.
    #[error("connectivity: {0}")]
    Connectivity(String),

    /// The database rejected the statement; retrying would not help.
    #[error("rejected: {0}")]
    Rejected(String),
}

impl ExecutionError {
    /// Whether this failure class is retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connectivity(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_apply_carries_statement_and_index() {
        let err = MigrateError::PartialApply {
            index: 2,
            statement: "DEFINE FIELD name ON user TYPE string;".to_string(),
            reason: "table missing".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("statement 2"));
        assert!(msg.contains("DEFINE FIELD name ON user"));
    }

    #[test]
    fn test_checksum_mismatch_display() {
        let err = MigrateError::ChecksumMismatch {
            id: "20250102120000".to_string(),
            expected: "abc".to_string(),
            actual: "xyz".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("abc"));
        assert!(msg.contains("xyz"));
    }

    #[test]
    fn test_recoverability() {
        assert!(MigrateError::NoChanges.is_recoverable());
        assert!(
            !MigrateError::PendingEntryExists("m1".to_string()).is_recoverable()
        );
    }

    #[test]
    fn test_execution_error_classes() {
        assert!(ExecutionError::Connectivity("reset".into()).is_transient());
        assert!(!ExecutionError::Rejected("bad type".into()).is_transient());
    }
}
