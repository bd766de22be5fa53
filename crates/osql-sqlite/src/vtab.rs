// crates/osql-sqlite/src/vtab.rs
// ============================================================================
// Module: Virtual Table Attachment
// Description: Exposes table plugins to SQLite as read-only virtual tables.
// Purpose: Attach and detach registry tables on a single native connection.
// Dependencies: osql-core, rusqlite (vtab)
// ============================================================================

//! ## Overview
//! Every [`TablePlugin`] is registered as a SQLite module named after the
//! table and instantiated as `temp.<name>`. The declared schema carries the
//! plugin's column types so that direct column references resolve through
//! the engine's declared-type lookup. Rows are generated on every scan.
//!
//! Module registration and table creation are per connection; nothing here
//! is shared between the primary and transient connections.

#![allow(unsafe_code, reason = "rusqlite virtual table traits are unsafe to implement.")]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::ffi::c_int;
use std::marker::PhantomData;
use std::sync::Arc;

use osql_core::ColumnType;
use osql_core::FieldValue;
use osql_core::QueryData;
use osql_core::SqlError;
use osql_core::TableColumns;
use osql_core::TablePlugin;
use rusqlite::Connection;
use rusqlite::vtab::Context;
use rusqlite::vtab::CreateVTab;
use rusqlite::vtab::Filters;
use rusqlite::vtab::IndexInfo;
use rusqlite::vtab::VTab;
use rusqlite::vtab::VTabConnection;
use rusqlite::vtab::VTabCursor;
use rusqlite::vtab::VTabKind;
use rusqlite::vtab::read_only_module;
use rusqlite::vtab::sqlite3_vtab;
use rusqlite::vtab::sqlite3_vtab_cursor;

use crate::codes::allocation_error;
use crate::codes::execution_error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Cost reported to the planner for a full plugin scan.
const FULL_SCAN_COST: f64 = 1_000_000.0;

// ============================================================================
// SECTION: Attachment
// ============================================================================

/// Returns true when `name` is a plain SQL identifier.
#[must_use]
pub fn is_valid_table_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Attaches `plugin` to `connection` as `temp.<name>`.
///
/// `modules` tracks module names already registered on this connection so a
/// table can be re-attached after a detach.
pub(crate) fn attach_table(
    connection: &Connection,
    plugin: &Arc<dyn TablePlugin>,
    modules: &mut BTreeSet<String>,
) -> Result<(), SqlError> {
    let name = plugin.name().to_string();
    if !is_valid_table_name(&name) {
        return Err(SqlError::ResourceAllocation(format!("invalid table name: {name:?}")));
    }
    if !modules.contains(&name) {
        connection
            .create_module(name.as_str(), read_only_module::<PluginTable>(), Some(Arc::clone(plugin)))
            .map_err(|err| allocation_error(&err))?;
        modules.insert(name.clone());
    }
    connection
        .execute_batch(&format!("CREATE VIRTUAL TABLE temp.\"{name}\" USING \"{name}\""))
        .map_err(|err| allocation_error(&err))
}

/// Drops `temp.<name>` from `connection` if present.
pub(crate) fn detach_table(connection: &Connection, name: &str) -> Result<(), SqlError> {
    if !is_valid_table_name(name) {
        return Err(SqlError::TableNotFound(name.to_string()));
    }
    connection
        .execute_batch(&format!("DROP TABLE IF EXISTS temp.\"{name}\""))
        .map_err(|err| execution_error(&err))
}

/// Builds the `CREATE TABLE` declaration handed to `sqlite3_declare_vtab`.
fn declare_schema(columns: &TableColumns) -> String {
    let definitions: Vec<String> = columns
        .iter()
        .map(|column| {
            let name = column.name.replace('"', "\"\"");
            match column.column_type {
                ColumnType::Unknown => format!("\"{name}\""),
                known => format!("\"{name}\" {}", known.as_str()),
            }
        })
        .collect();
    format!("CREATE TABLE x({})", definitions.join(", "))
}

// ============================================================================
// SECTION: Virtual Table
// ============================================================================

/// Virtual table instance backed by a plugin.
#[repr(C)]
struct PluginTable {
    /// Base class; must be first.
    base: sqlite3_vtab,
    /// Row source.
    plugin: Arc<dyn TablePlugin>,
    /// Column names in declaration order.
    column_names: Arc<[String]>,
}

// SAFETY: `PluginTable` is `repr(C)` with `sqlite3_vtab` as its first field.
unsafe impl<'vtab> VTab<'vtab> for PluginTable {
    type Aux = Arc<dyn TablePlugin>;
    type Cursor = PluginCursor<'vtab>;

    fn connect(
        _db: &mut VTabConnection,
        aux: Option<&Self::Aux>,
        _args: &[&[u8]],
    ) -> rusqlite::Result<(String, Self)> {
        let plugin = aux
            .map(Arc::clone)
            .ok_or_else(|| rusqlite::Error::ModuleError("missing table plugin".to_string()))?;
        let columns = plugin.columns();
        if columns.is_empty() {
            return Err(rusqlite::Error::ModuleError(format!(
                "table {} declares no columns",
                plugin.name()
            )));
        }
        let schema = declare_schema(&columns);
        let column_names = columns.into_iter().map(|column| column.name).collect();
        Ok((
            schema,
            Self {
                base: sqlite3_vtab::default(),
                plugin,
                column_names,
            },
        ))
    }

    fn best_index(&self, info: &mut IndexInfo) -> rusqlite::Result<()> {
        info.set_estimated_cost(FULL_SCAN_COST);
        Ok(())
    }

    fn open(&mut self) -> rusqlite::Result<PluginCursor<'vtab>> {
        Ok(PluginCursor {
            base: sqlite3_vtab_cursor::default(),
            plugin: Arc::clone(&self.plugin),
            column_names: Arc::clone(&self.column_names),
            rows: QueryData::new(),
            position: 0,
            phantom: PhantomData,
        })
    }
}

impl CreateVTab<'_> for PluginTable {
    const KIND: VTabKind = VTabKind::Default;
}

/// Scan cursor over one generation of plugin rows.
#[repr(C)]
struct PluginCursor<'vtab> {
    /// Base class; must be first.
    base: sqlite3_vtab_cursor,
    /// Row source.
    plugin: Arc<dyn TablePlugin>,
    /// Column names in declaration order.
    column_names: Arc<[String]>,
    /// Rows produced by the last `filter` call.
    rows: QueryData,
    /// Index of the current row.
    position: usize,
    /// Ties the cursor to its table.
    phantom: PhantomData<&'vtab PluginTable>,
}

// SAFETY: `PluginCursor` is `repr(C)` with `sqlite3_vtab_cursor` as its first field.
unsafe impl VTabCursor for PluginCursor<'_> {
    fn filter(
        &mut self,
        _idx_num: c_int,
        _idx_str: Option<&str>,
        _args: &Filters<'_>,
    ) -> rusqlite::Result<()> {
        self.rows =
            self.plugin.generate().map_err(|err| rusqlite::Error::ModuleError(err.to_string()))?;
        self.position = 0;
        Ok(())
    }

    fn next(&mut self) -> rusqlite::Result<()> {
        self.position += 1;
        Ok(())
    }

    fn eof(&self) -> bool {
        self.position >= self.rows.len()
    }

    fn column(&self, ctx: &mut Context, i: c_int) -> rusqlite::Result<()> {
        let value = usize::try_from(i)
            .ok()
            .and_then(|index| self.column_names.get(index))
            .and_then(|name| self.rows.get(self.position).and_then(|row| row.get(name)));
        match value {
            None | Some(FieldValue::Null) => ctx.set_result(&rusqlite::types::Null),
            Some(FieldValue::Integer(value)) => ctx.set_result(value),
            Some(FieldValue::Real(value)) => ctx.set_result(value),
            Some(FieldValue::Text(value)) => ctx.set_result(value),
            Some(FieldValue::Blob(value)) => ctx.set_result(value),
        }
    }

    fn rowid(&self) -> rusqlite::Result<i64> {
        Ok(i64::try_from(self.position).unwrap_or(i64::MAX))
    }
}
