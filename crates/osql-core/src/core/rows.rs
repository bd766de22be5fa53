// crates/osql-core/src/core/rows.rs
// ============================================================================
// Module: Result Rows
// Description: Row and field value containers for query results.
// Purpose: Carry engine results without exposing engine value types.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Rows are keyed by result column name. Duplicate column names in a result
//! set collapse to the last value, matching how callers address columns.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::core::columns::ColumnType;

/// A single field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// SQL `NULL`.
    Null,
    /// Integer value.
    Integer(i64),
    /// Floating point value.
    Real(f64),
    /// Text value.
    Text(String),
    /// Raw bytes.
    Blob(Vec<u8>),
}

impl FieldValue {
    /// Returns the column type implied by this value.
    #[must_use]
    pub const fn column_type(&self) -> ColumnType {
        match self {
            Self::Null => ColumnType::Unknown,
            Self::Integer(_) => ColumnType::Integer,
            Self::Real(_) => ColumnType::Real,
            Self::Text(_) => ColumnType::Text,
            Self::Blob(_) => ColumnType::Blob,
        }
    }

    /// Returns the value as an integer when it is one, or parses integer text.
    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            Self::Text(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    /// Returns the value as text when it is text.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// One result row keyed by column name.
pub type Row = BTreeMap<String, FieldValue>;

/// Ordered result rows.
pub type QueryData = Vec<Row>;
