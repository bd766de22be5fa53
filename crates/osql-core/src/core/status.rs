// crates/osql-core/src/core/status.rs
// ============================================================================
// Module: SQL Status
// Description: Error taxonomy and type-resolution outcomes.
// Purpose: Separate fatal SQL failures from soft partial type resolution.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! [`SqlError`] is returned for failures that stop an operation: connection or
//! table allocation, engine execution, or disabled and unknown tables. None of
//! them are retried internally. Partial column typing is not an error; it is
//! reported through [`TypeResolution::Partial`] alongside usable columns.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::columns::TableColumns;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// SQL layer errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling via [`SqlError::kind`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SqlError {
    /// A native connection or table attachment could not be created.
    #[error("sql resource allocation failed: {0}")]
    ResourceAllocation(String),
    /// The engine rejected or failed a statement.
    #[error("sql query execution failed: {0}")]
    QueryExecution(String),
    /// The referenced table is disabled by configuration.
    #[error("table is disabled: {0}")]
    TableDisabled(String),
    /// The referenced table is not registered.
    #[error("table is not registered: {0}")]
    TableNotFound(String),
}

impl SqlError {
    /// Returns the stable error classification.
    #[must_use]
    pub const fn kind(&self) -> SqlErrorKind {
        match self {
            Self::ResourceAllocation(_) => SqlErrorKind::ResourceAllocation,
            Self::QueryExecution(_) => SqlErrorKind::QueryExecution,
            Self::TableDisabled(_) => SqlErrorKind::TableDisabled,
            Self::TableNotFound(_) => SqlErrorKind::TableNotFound,
        }
    }
}

/// Stable classification of [`SqlError`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SqlErrorKind {
    /// Connection or attachment allocation failure.
    ResourceAllocation,
    /// Statement execution failure.
    QueryExecution,
    /// Disabled table reference.
    TableDisabled,
    /// Unregistered table reference.
    TableNotFound,
}

impl SqlErrorKind {
    /// Returns a stable label for the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ResourceAllocation => "resource_allocation",
            Self::QueryExecution => "query_execution",
            Self::TableDisabled => "table_disabled",
            Self::TableNotFound => "table_not_found",
        }
    }
}

// ============================================================================
// SECTION: Type Resolution
// ============================================================================

/// Outcome of resolving result column types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TypeResolution {
    /// Every column has a concrete type.
    Complete,
    /// Some columns remain `Unknown`; callers may still use the result.
    Partial {
        /// Indexes of the columns that remain unresolved.
        unresolved: Vec<usize>,
    },
}

impl TypeResolution {
    /// Computes the outcome for a column list.
    #[must_use]
    pub fn of(columns: &TableColumns) -> Self {
        let unresolved: Vec<usize> = columns
            .iter()
            .enumerate()
            .filter(|(_, column)| !column.column_type.is_known())
            .map(|(index, _)| index)
            .collect();
        if unresolved.is_empty() { Self::Complete } else { Self::Partial { unresolved } }
    }

    /// Returns true when every column resolved.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }
}

/// Result columns together with their resolution outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnResolution {
    /// Result columns in output order.
    pub columns: TableColumns,
    /// Whether every column resolved.
    pub status: TypeResolution,
}

impl ColumnResolution {
    /// Wraps columns and derives their resolution outcome.
    #[must_use]
    pub fn new(columns: TableColumns) -> Self {
        let status = TypeResolution::of(&columns);
        Self {
            columns,
            status,
        }
    }
}
