// crates/osql-cli/src/tables.rs
// ============================================================================
// Module: Built-In Tables
// Description: Table plugins backed by process state.
// Purpose: Provide queryable tables for the osql binary.
// Dependencies: osql-core, osql-sqlite
// ============================================================================

//! ## Overview
//! - `env`: process environment variables.
//! - `osql_info`: version and process identity of the running tool.
//! - `osql_opcodes`: the opcode table used for column type inference.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::process;
use std::sync::Arc;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use osql_core::ColumnType;
use osql_core::FieldValue;
use osql_core::QueryData;
use osql_core::Row;
use osql_core::StaticTableRegistry;
use osql_core::TableColumn;
use osql_core::TableColumns;
use osql_core::TableError;
use osql_core::TablePlugin;
use osql_sqlite::OPCODE_SEMANTICS;
use osql_sqlite::OpcodeEffect;

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Returns a registry holding every built-in table.
#[must_use]
pub fn builtin_registry() -> StaticTableRegistry {
    StaticTableRegistry::new()
        .with(Arc::new(EnvTable))
        .with(Arc::new(OsqlInfoTable::new()))
        .with(Arc::new(OpcodesTable))
}

// ============================================================================
// SECTION: env
// ============================================================================

/// Process environment variables.
pub struct EnvTable;

impl TablePlugin for EnvTable {
    fn name(&self) -> &str {
        "env"
    }

    fn columns(&self) -> TableColumns {
        vec![TableColumn::new("key", ColumnType::Text), TableColumn::new("value", ColumnType::Text)]
    }

    fn generate(&self) -> Result<QueryData, TableError> {
        Ok(env::vars_os()
            .map(|(key, value)| {
                let mut row = Row::new();
                row.insert("key".to_string(), FieldValue::from(key.to_string_lossy().into_owned()));
                row.insert(
                    "value".to_string(),
                    FieldValue::from(value.to_string_lossy().into_owned()),
                );
                row
            })
            .collect())
    }
}

// ============================================================================
// SECTION: osql_info
// ============================================================================

/// Identity of the running tool.
pub struct OsqlInfoTable {
    /// Seconds since the Unix epoch when the table was created.
    started_at: i64,
}

impl OsqlInfoTable {
    /// Creates the table, recording the current time as the start time.
    #[must_use]
    pub fn new() -> Self {
        let started_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .ok()
            .and_then(|elapsed| i64::try_from(elapsed.as_secs()).ok())
            .unwrap_or_default();
        Self {
            started_at,
        }
    }
}

impl Default for OsqlInfoTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TablePlugin for OsqlInfoTable {
    fn name(&self) -> &str {
        "osql_info"
    }

    fn columns(&self) -> TableColumns {
        vec![
            TableColumn::new("version", ColumnType::Text),
            TableColumn::new("pid", ColumnType::Integer),
            TableColumn::new("started_at", ColumnType::Integer),
        ]
    }

    fn generate(&self) -> Result<QueryData, TableError> {
        let mut row = Row::new();
        row.insert("version".to_string(), FieldValue::from(env!("CARGO_PKG_VERSION")));
        row.insert("pid".to_string(), FieldValue::from(i64::from(process::id())));
        row.insert("started_at".to_string(), FieldValue::from(self.started_at));
        Ok(vec![row])
    }
}

// ============================================================================
// SECTION: osql_opcodes
// ============================================================================

/// Opcodes that pin a result column type during inference.
pub struct OpcodesTable;

impl TablePlugin for OpcodesTable {
    fn name(&self) -> &str {
        "osql_opcodes"
    }

    fn columns(&self) -> TableColumns {
        vec![
            TableColumn::new("opcode", ColumnType::Text),
            TableColumn::new("register", ColumnType::Text),
            TableColumn::new("result_type", ColumnType::Text),
        ]
    }

    fn generate(&self) -> Result<QueryData, TableError> {
        Ok(OPCODE_SEMANTICS
            .iter()
            .map(|entry| {
                let result_type = match entry.effect {
                    OpcodeEffect::Fixed(column_type) => column_type.as_str(),
                    OpcodeEffect::Arithmetic => "NUMERIC",
                    OpcodeEffect::ColumnFetch => "DECLARED",
                    OpcodeEffect::FunctionResult {
                        ..
                    } => "FUNCTION",
                    OpcodeEffect::CastAffinity => "AFFINITY",
                };
                let mut row = Row::new();
                row.insert("opcode".to_string(), FieldValue::from(entry.opcode));
                row.insert("register".to_string(), FieldValue::from(entry.register.as_str()));
                row.insert("result_type".to_string(), FieldValue::from(result_type));
                row
            })
            .collect())
    }
}
