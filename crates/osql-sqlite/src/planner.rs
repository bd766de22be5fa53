// crates/osql-sqlite/src/planner.rs
// ============================================================================
// Module: Query Planner
// Description: Column type inference from SQLite EXPLAIN output.
// Purpose: Type expression columns the engine's schema lookup cannot resolve.
// Dependencies: osql-core, rusqlite, tracing
// ============================================================================

//! ## Overview
//! The planner issues two introspection queries for a statement:
//! `EXPLAIN QUERY PLAN` for the order of scanned tables and `EXPLAIN` for the
//! bytecode program. Each scanned table's declared column types are read
//! with `PRAGMA table_xinfo`, and table cursors opened by the program are
//! matched to scanned tables in scan order.
//!
//! The program is then interpreted in emission order with a register-to-type
//! map: opcodes from [`crate::opcodes::OPCODE_SEMANTICS`] overwrite the type
//! of the register they write, register copies carry types along, and
//! everything else is skipped. Result columns map to the registers named by
//! the last `ResultRow` opcode.
//!
//! SQLite emits factored constants after the main body, in a run-once section
//! that the leading `Init` jumps to before the body runs. That section is
//! interpreted once up front to seed the map, so arithmetic and copies in the
//! body see constant operand types.
//!
//! ## Invariants
//! - After seeding, rows are interpreted strictly in program order; the last
//!   write to a register decides its type.
//! - Columns that already have a concrete type are never modified.
//! - If either introspection query fails, the caller's columns are untouched.
//!   A failed schema lookup only leaves that table's fetches untyped.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use osql_core::ColumnType;
use osql_core::FieldValue;
use osql_core::Row;
use osql_core::SqlError;
use osql_core::TableColumns;
use osql_core::TypeResolution;
use rusqlite::Connection;
use tracing::debug;

use crate::opcodes::FunctionType;
use crate::opcodes::OpcodeEffect;
use crate::opcodes::Register;
use crate::opcodes::affinity_type;
use crate::opcodes::arithmetic_type;
use crate::opcodes::function_name;
use crate::opcodes::function_type;
use crate::opcodes::opcode_semantics;
use crate::query::query_internal;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Upper bound on registers moved by a single copy opcode.
const MAX_REGISTER_SPAN: i64 = 4_096;

// ============================================================================
// SECTION: Program Rows
// ============================================================================

/// One instruction of an `EXPLAIN` program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramRow {
    /// Opcode name.
    pub opcode: String,
    /// First operand.
    pub p1: i64,
    /// Second operand.
    pub p2: i64,
    /// Third operand.
    pub p3: i64,
    /// Fourth operand in its textual form.
    pub p4: Option<String>,
}

impl ProgramRow {
    /// Creates a row without a P4 operand.
    #[must_use]
    pub fn new(opcode: impl Into<String>, p1: i64, p2: i64, p3: i64) -> Self {
        Self {
            opcode: opcode.into(),
            p1,
            p2,
            p3,
            p4: None,
        }
    }

    /// Sets the P4 operand.
    #[must_use]
    pub fn with_p4(mut self, p4: impl Into<String>) -> Self {
        self.p4 = Some(p4.into());
        self
    }

    /// Returns the value of an operand.
    #[must_use]
    pub const fn operand(&self, register: Register) -> i64 {
        match register {
            Register::P1 => self.p1,
            Register::P2 => self.p2,
            Register::P3 => self.p3,
        }
    }

    /// Parses a row of `EXPLAIN` output.
    ///
    /// # Errors
    ///
    /// Returns [`SqlError::QueryExecution`] when the opcode or an operand is missing.
    pub fn from_row(row: &Row) -> Result<Self, SqlError> {
        let opcode = row
            .get("opcode")
            .and_then(FieldValue::as_text)
            .ok_or_else(|| SqlError::QueryExecution("explain row missing opcode".to_string()))?;
        let operand = |register: Register| {
            row.get(register.as_str()).and_then(FieldValue::as_integer).ok_or_else(|| {
                SqlError::QueryExecution(format!(
                    "explain row for {opcode} missing {}",
                    register.as_str()
                ))
            })
        };
        let p4 = match row.get("p4") {
            Some(FieldValue::Text(text)) => Some(text.clone()),
            Some(FieldValue::Integer(value)) => Some(value.to_string()),
            _ => None,
        };
        Ok(Self {
            opcode: opcode.to_string(),
            p1: operand(Register::P1)?,
            p2: operand(Register::P2)?,
            p3: operand(Register::P3)?,
            p4,
        })
    }

    /// Returns `(from, to, count, clears_source)` for register copy opcodes.
    fn register_transfer(&self) -> Option<(i64, i64, i64, bool)> {
        match self.opcode.as_str() {
            "Copy" => Some((self.p1, self.p2, self.p3.saturating_add(1), false)),
            "SCopy" => Some((self.p1, self.p2, 1, false)),
            "Move" => Some((self.p1, self.p2, self.p3, true)),
            _ => None,
        }
    }

    /// Returns true when the row opens a cursor on a table rather than an index.
    fn opens_table_cursor(&self) -> bool {
        match self.opcode.as_str() {
            "VOpen" => true,
            "OpenRead" => !self.p4.as_deref().is_some_and(|p4| p4.starts_with("k(")),
            _ => false,
        }
    }
}

// ============================================================================
// SECTION: Planner
// ============================================================================

/// Inferred register types after interpreting a program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramTypes {
    /// Concrete type per register.
    pub registers: BTreeMap<i64, ColumnType>,
    /// First result register of the terminal `ResultRow`, when present.
    pub result_start: Option<i64>,
}

/// Scan plan and program of one statement.
#[derive(Debug, Clone, Default)]
pub struct QueryPlanner {
    /// Tables in scan order.
    tables: Vec<String>,
    /// Declared column types per scanned table, in column order.
    schemas: BTreeMap<String, Vec<ColumnType>>,
    /// `EXPLAIN` program rows in emission order.
    program: Vec<ProgramRow>,
}

impl QueryPlanner {
    /// Runs both introspection queries for `sql` on `connection`.
    ///
    /// # Errors
    ///
    /// Returns [`SqlError::QueryExecution`] when either introspection query fails.
    pub fn new(sql: &str, connection: &Connection) -> Result<Self, SqlError> {
        let plan = query_internal(&format!("EXPLAIN QUERY PLAN {sql}"), connection)?;
        let program = query_internal(&format!("EXPLAIN {sql}"), connection)?;
        let tables = plan
            .iter()
            .filter_map(|row| row.get("detail").and_then(FieldValue::as_text))
            .filter_map(scanned_table)
            .collect();
        let program = program.iter().map(ProgramRow::from_row).collect::<Result<Vec<_>, _>>()?;
        let mut planner = Self::from_program(tables, program);
        for table in planner.tables.clone() {
            if planner.schemas.contains_key(&table) {
                continue;
            }
            if let Some(schema) = read_table_schema(connection, &table) {
                planner.schemas.insert(table, schema);
            }
        }
        Ok(planner)
    }

    /// Builds a planner from an already captured scan order and program.
    #[must_use]
    pub const fn from_program(tables: Vec<String>, program: Vec<ProgramRow>) -> Self {
        Self {
            tables,
            schemas: BTreeMap::new(),
            program,
        }
    }

    /// Sets the declared column types of a scanned table.
    #[must_use]
    pub fn with_table_schema(
        mut self,
        table: impl Into<String>,
        columns: Vec<ColumnType>,
    ) -> Self {
        self.schemas.insert(table.into(), columns);
        self
    }

    /// Returns the scanned tables in scan order.
    #[must_use]
    pub fn scanned_tables(&self) -> &[String] {
        &self.tables
    }

    /// Returns the declared column types of a scanned table, when known.
    #[must_use]
    pub fn table_schema(&self, table: &str) -> Option<&[ColumnType]> {
        self.schemas.get(table).map(Vec::as_slice)
    }

    /// Returns the program rows.
    #[must_use]
    pub fn program(&self) -> &[ProgramRow] {
        &self.program
    }

    /// Interprets the program and returns the final register types.
    #[must_use]
    pub fn interpret(&self) -> ProgramTypes {
        let cursors = self.cursor_tables();
        let mut types = ProgramTypes::default();
        for row in self.run_once_section() {
            self.step(row, &cursors, &mut types);
        }
        types.result_start = None;
        for row in &self.program {
            self.step(row, &cursors, &mut types);
        }
        types
    }

    /// Returns the rows the leading `Init` runs before the body.
    fn run_once_section(&self) -> &[ProgramRow] {
        let start = match self.program.first() {
            Some(row) if row.opcode == "Init" => usize::try_from(row.p2).ok(),
            _ => None,
        };
        start
            .filter(|start| *start > 0)
            .and_then(|start| self.program.get(start ..))
            .unwrap_or(&[])
    }

    /// Maps table cursors to scanned tables, pairing them in order.
    fn cursor_tables(&self) -> BTreeMap<i64, &str> {
        self.program
            .iter()
            .filter(|row| row.opens_table_cursor())
            .zip(&self.tables)
            .map(|(row, table)| (row.p1, table.as_str()))
            .collect()
    }

    /// Applies one program row to the register map.
    fn step(&self, row: &ProgramRow, cursors: &BTreeMap<i64, &str>, types: &mut ProgramTypes) {
        if row.opcode == "ResultRow" {
            types.result_start = Some(row.p1);
            return;
        }
        if let Some((from, to, count, clears_source)) = row.register_transfer() {
            transfer(&mut types.registers, from, to, count, clears_source);
            return;
        }
        let Some(semantics) = opcode_semantics(&row.opcode) else {
            return;
        };
        let register = row.operand(semantics.register);
        let registers = &types.registers;
        let written = match semantics.effect {
            OpcodeEffect::Fixed(column_type) => Some(column_type),
            OpcodeEffect::Arithmetic => arithmetic_type(
                registers.get(&row.p1).copied(),
                registers.get(&row.p2).copied(),
            ),
            OpcodeEffect::ColumnFetch => self.fetched_type(cursors, row.p1, row.p2),
            OpcodeEffect::FunctionResult {
                argument,
            } => match row.p4.as_deref().and_then(function_name).and_then(function_type) {
                Some(FunctionType::Fixed(column_type)) => Some(column_type),
                Some(FunctionType::FirstArgument) => {
                    registers.get(&row.operand(argument)).copied()
                }
                None => None,
            },
            OpcodeEffect::CastAffinity => affinity_type(row.p2),
        };
        match written {
            Some(column_type) => {
                types.registers.insert(register, column_type);
            }
            None => {
                types.registers.remove(&register);
            }
        }
    }

    /// Returns the declared type of `column` in the table open on `cursor`.
    fn fetched_type(
        &self,
        cursors: &BTreeMap<i64, &str>,
        cursor: i64,
        column: i64,
    ) -> Option<ColumnType> {
        let table = cursors.get(&cursor)?;
        let index = usize::try_from(column).ok()?;
        let column_type = self.schemas.get(*table)?.get(index).copied()?;
        column_type.is_known().then_some(column_type)
    }

    /// Fills in `Unknown` columns from the program's result registers.
    ///
    /// Columns that already carry a concrete type are left as they are.
    pub fn apply_types(&self, columns: &mut TableColumns) -> TypeResolution {
        let types = self.interpret();
        if let Some(start) = types.result_start {
            for (index, column) in columns.iter_mut().enumerate() {
                if column.column_type.is_known() {
                    continue;
                }
                let Some(register) =
                    i64::try_from(index).ok().and_then(|offset| start.checked_add(offset))
                else {
                    continue;
                };
                if let Some(column_type) = types.registers.get(&register) {
                    column.column_type = *column_type;
                }
            }
        }
        TypeResolution::of(columns)
    }
}

/// Infers types for the `Unknown` entries of `columns`.
///
/// On error `columns` is unchanged.
///
/// # Errors
///
/// Returns [`SqlError::QueryExecution`] when either introspection query fails.
pub fn infer_column_types(
    sql: &str,
    connection: &Connection,
    columns: &mut TableColumns,
) -> Result<TypeResolution, SqlError> {
    let planner = QueryPlanner::new(sql, connection)?;
    let status = planner.apply_types(columns);
    debug!(
        program_rows = planner.program.len(),
        scanned_tables = %planner.tables.join(","),
        table_schemas = planner.schemas.len(),
        complete = status.is_complete(),
        "inferred column types from query program"
    );
    Ok(status)
}

/// Copies register types from `from..from+count` to `to..to+count`.
///
/// Register numbers that would overflow end the copy early.
fn transfer(
    registers: &mut BTreeMap<i64, ColumnType>,
    from: i64,
    to: i64,
    count: i64,
    clears_source: bool,
) {
    let count = count.clamp(0, MAX_REGISTER_SPAN);
    let pairs: Vec<(i64, i64)> = (0 .. count)
        .map_while(|offset| Some((from.checked_add(offset)?, to.checked_add(offset)?)))
        .collect();
    let moved: Vec<Option<ColumnType>> =
        pairs.iter().map(|(source, _)| registers.get(source).copied()).collect();
    if clears_source {
        for (source, _) in &pairs {
            registers.remove(source);
        }
    }
    for ((_, target), column_type) in pairs.iter().zip(moved) {
        match column_type {
            Some(column_type) => {
                registers.insert(*target, column_type);
            }
            None => {
                registers.remove(target);
            }
        }
    }
}

/// Reads the declared column types of `table`, including hidden columns.
///
/// Returns `None` when the lookup fails or the name is not a table, such as
/// an alias reported by the scan plan.
fn read_table_schema(connection: &Connection, table: &str) -> Option<Vec<ColumnType>> {
    let sql = format!("PRAGMA table_xinfo(\"{}\")", table.replace('"', "\"\""));
    let rows = match query_internal(&sql, connection) {
        Ok(rows) => rows,
        Err(err) => {
            debug!(table, error = %err, "table schema lookup failed");
            return None;
        }
    };
    let schema: Vec<ColumnType> = rows
        .iter()
        .map(|row| {
            row.get("type")
                .and_then(FieldValue::as_text)
                .map_or(ColumnType::Unknown, ColumnType::from_declared_type)
        })
        .collect();
    if schema.is_empty() { None } else { Some(schema) }
}

/// Extracts the table name from a `SCAN`/`SEARCH` plan detail.
fn scanned_table(detail: &str) -> Option<String> {
    let mut tokens = detail.split_whitespace();
    match tokens.next()? {
        "SCAN" | "SEARCH" => {}
        _ => return None,
    }
    let mut name = tokens.next()?;
    if name == "TABLE" {
        name = tokens.next()?;
    }
    match name {
        "CONSTANT" | "SUBQUERY" => None,
        table => Some(table.to_string()),
    }
}
