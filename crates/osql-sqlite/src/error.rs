// crates/osql-sqlite/src/error.rs
// ============================================================================
// Module: SQLite Pool Errors
// Description: Lifecycle errors for the connection pool.
// Purpose: Report invalid configuration and teardown failures.
// Dependencies: osql-core, thiserror
// ============================================================================

//! Pool construction and teardown errors.

use osql_core::SqlError;
use thiserror::Error;

/// Pool lifecycle errors.
///
/// # Invariants
/// - Per-query failures are reported as [`SqlError`], not through this type.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SqliteDbError {
    /// Pool configuration is invalid.
    #[error("sqlite pool config invalid: {0}")]
    Invalid(String),
    /// Engine failure during pool setup or teardown.
    #[error(transparent)]
    Sql(#[from] SqlError),
}
