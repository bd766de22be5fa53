// crates/osql-sqlite/src/config.rs
// ============================================================================
// Module: SQLite Pool Configuration
// Description: Engine limits and disabled-table list for the connection pool.
// Purpose: Carry the raw configuration consumed once at pool creation.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! [`SqlitePoolConfig`] is deserialized from the `[sqlite]` section of the
//! osql configuration file. The disabled-table list stays a raw comma string
//! here; it is parsed exactly once when the pool is constructed.

use serde::Deserialize;

use crate::SqliteDbError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default soft heap ceiling applied to the engine (5 MiB).
pub const DEFAULT_SOFT_HEAP_LIMIT_BYTES: u64 = 5 * 1024 * 1024;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

// ============================================================================
// SECTION: Config
// ============================================================================

/// Configuration for [`crate::SqliteDbManager`].
///
/// # Invariants
/// - `soft_heap_limit_bytes` is greater than zero and fits in an `i64`.
/// - `disabled_tables` is a comma-delimited list of exact table names.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SqlitePoolConfig {
    /// Comma-delimited table names excluded from attachment.
    #[serde(default)]
    pub disabled_tables: String,
    /// Soft heap ceiling applied once when the primary connection is created.
    #[serde(default = "default_soft_heap_limit_bytes")]
    pub soft_heap_limit_bytes: u64,
    /// Busy timeout in milliseconds for every connection.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for SqlitePoolConfig {
    fn default() -> Self {
        Self {
            disabled_tables: String::new(),
            soft_heap_limit_bytes: DEFAULT_SOFT_HEAP_LIMIT_BYTES,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

impl SqlitePoolConfig {
    /// Validates engine limits.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteDbError::Invalid`] when a limit is out of range.
    pub fn validate(&self) -> Result<(), SqliteDbError> {
        if self.soft_heap_limit_bytes == 0 {
            return Err(SqliteDbError::Invalid(
                "soft_heap_limit_bytes must be greater than zero".to_string(),
            ));
        }
        if i64::try_from(self.soft_heap_limit_bytes).is_err() {
            return Err(SqliteDbError::Invalid(format!(
                "soft_heap_limit_bytes out of range: {}",
                self.soft_heap_limit_bytes
            )));
        }
        Ok(())
    }
}

/// Returns the default soft heap ceiling.
const fn default_soft_heap_limit_bytes() -> u64 {
    DEFAULT_SOFT_HEAP_LIMIT_BYTES
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}
