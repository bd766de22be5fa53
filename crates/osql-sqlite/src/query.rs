// crates/osql-sqlite/src/query.rs
// ============================================================================
// Module: Query Execution
// Description: Statement execution and result column introspection.
// Purpose: Run SQL on a native connection and resolve result column types.
// Dependencies: osql-core, rusqlite
// ============================================================================

//! ## Overview
//! These functions operate on any native connection. Column resolution first
//! asks the engine for declared types (exact for direct table columns) and
//! only runs the query planner when some column is still `Unknown`.

use osql_core::ColumnResolution;
use osql_core::ColumnType;
use osql_core::FieldValue;
use osql_core::QueryData;
use osql_core::Row;
use osql_core::SqlError;
use osql_core::TableColumn;
use osql_core::TableColumns;
use rusqlite::Connection;
use rusqlite::types::ValueRef;

use crate::codes::execution_error;
use crate::planner::infer_column_types;

/// Executes `sql` and collects every row.
///
/// # Errors
///
/// Returns [`SqlError::QueryExecution`] when the engine rejects or fails the statement.
pub fn query_internal(sql: &str, connection: &Connection) -> Result<QueryData, SqlError> {
    let mut statement = connection.prepare(sql).map_err(|err| execution_error(&err))?;
    let names: Vec<String> = statement.column_names().into_iter().map(str::to_string).collect();
    let mut rows = statement.query([]).map_err(|err| execution_error(&err))?;
    let mut results = QueryData::new();
    while let Some(row) = rows.next().map_err(|err| execution_error(&err))? {
        let mut record = Row::new();
        for (index, name) in names.iter().enumerate() {
            let value = row.get_ref(index).map_err(|err| execution_error(&err))?;
            record.insert(name.clone(), field_value(value));
        }
        results.push(record);
    }
    Ok(results)
}

/// Returns the result columns of `sql` with their declared types.
///
/// Columns without a declared type (expressions, aggregates) are `Unknown`.
///
/// # Errors
///
/// Returns [`SqlError::QueryExecution`] when the statement cannot be prepared.
pub fn query_columns_internal(sql: &str, connection: &Connection) -> Result<TableColumns, SqlError> {
    let statement = connection.prepare(sql).map_err(|err| execution_error(&err))?;
    Ok(statement
        .columns()
        .iter()
        .map(|column| {
            let column_type =
                column.decl_type().map_or(ColumnType::Unknown, ColumnType::from_declared_type);
            TableColumn::new(column.name(), column_type)
        })
        .collect())
}

/// Resolves result column types, inferring the ones the schema cannot.
///
/// # Errors
///
/// Returns [`SqlError::QueryExecution`] when the statement or an
/// introspection query fails.
pub fn resolve_column_types(sql: &str, connection: &Connection) -> Result<ColumnResolution, SqlError> {
    let mut columns = query_columns_internal(sql, connection)?;
    if columns.iter().any(|column| !column.column_type.is_known()) {
        infer_column_types(sql, connection, &mut columns)?;
    }
    Ok(ColumnResolution::new(columns))
}

/// Converts an engine value to a [`FieldValue`].
fn field_value(value: ValueRef<'_>) -> FieldValue {
    match value {
        ValueRef::Null => FieldValue::Null,
        ValueRef::Integer(value) => FieldValue::Integer(value),
        ValueRef::Real(value) => FieldValue::Real(value),
        ValueRef::Text(bytes) => FieldValue::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => FieldValue::Blob(bytes.to_vec()),
    }
}
