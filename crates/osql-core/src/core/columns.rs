// crates/osql-core/src/core/columns.rs
// ============================================================================
// Module: Column Types
// Description: Result column descriptors and type resolution from declarations.
// Purpose: Describe the name and inferred type of every result column.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A [`TableColumns`] list is the unit exchanged by column introspection:
//! the engine fills in what its schema lookup can resolve, and the query
//! planner upgrades the remaining [`ColumnType::Unknown`] entries in place.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Column Type
// ============================================================================

/// Scalar type of a result column.
///
/// # Invariants
/// - `Unknown` is the only non-concrete variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ColumnType {
    /// Type could not be determined.
    #[default]
    Unknown,
    /// Text value.
    Text,
    /// 64-bit signed integer value.
    Integer,
    /// Floating point value.
    Real,
    /// Raw bytes.
    Blob,
}

impl ColumnType {
    /// Returns the SQL type name used in virtual table declarations.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::Text => "TEXT",
            Self::Integer => "INTEGER",
            Self::Real => "REAL",
            Self::Blob => "BLOB",
        }
    }

    /// Returns true for every variant except [`ColumnType::Unknown`].
    #[must_use]
    pub const fn is_known(self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// Resolves a declared column type using SQLite's affinity rules.
    ///
    /// Declarations with numeric affinity (`NUMERIC`, `DECIMAL`, `DATE`, ...)
    /// do not pin a storage class and resolve to [`ColumnType::Unknown`].
    #[must_use]
    pub fn from_declared_type(declared: &str) -> Self {
        let upper = declared.trim().to_ascii_uppercase();
        if upper.is_empty() {
            return Self::Unknown;
        }
        if upper.contains("INT") {
            Self::Integer
        } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
            Self::Text
        } else if upper.contains("BLOB") {
            Self::Blob
        } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
            Self::Real
        } else {
            Self::Unknown
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Columns
// ============================================================================

/// Name and type of a single column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableColumn {
    /// Column name as reported by the engine.
    pub name: String,
    /// Resolved or inferred column type.
    pub column_type: ColumnType,
}

impl TableColumn {
    /// Creates a column descriptor.
    #[must_use]
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// Ordered result columns.
pub type TableColumns = Vec<TableColumn>;
