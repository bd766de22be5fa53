// crates/osql-sqlite/tests/planner.rs
// ============================================================================
// Module: Query Planner Tests
// Description: Program interpretation over hand-built EXPLAIN programs.
// Purpose: Pin register typing order, copy propagation, and monotonicity.
// ============================================================================

//! ## Overview
//! Interprets synthetic programs through [`osql_sqlite::QueryPlanner`] so the
//! typing rules are checked independently of the engine's code generator.
//! Programs that start with `Init` mirror the engine's layout, with factored
//! constants after the body.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use osql_core::ColumnType;
use osql_core::FieldValue;
use osql_core::Row;
use osql_core::TableColumn;
use osql_core::TableColumns;
use osql_core::TypeResolution;
use osql_sqlite::ProgramRow;
use osql_sqlite::QueryPlanner;
use osql_sqlite::infer_column_types;
use proptest::prelude::*;
use rusqlite::Connection;

/// Builds `count` unknown columns.
fn unknown_columns(count: usize) -> TableColumns {
    (0 .. count).map(|index| TableColumn::new(index.to_string(), ColumnType::Unknown)).collect()
}

/// Interprets `program` over `count` unknown columns.
fn apply(program: Vec<ProgramRow>, count: usize) -> (TableColumns, TypeResolution) {
    let planner = QueryPlanner::from_program(Vec::new(), program);
    let mut columns = unknown_columns(count);
    let status = planner.apply_types(&mut columns);
    (columns, status)
}

/// Returns only the column types.
fn types(columns: &TableColumns) -> Vec<ColumnType> {
    columns.iter().map(|column| column.column_type).collect()
}

// ============================================================================
// SECTION: Ordering
// ============================================================================

#[test]
fn last_write_to_register_wins() {
    let program = vec![
        ProgramRow::new("String8", 0, 1, 0).with_p4("abc"),
        ProgramRow::new("Integer", 5, 1, 0),
        ProgramRow::new("ResultRow", 1, 1, 0),
    ];
    let (columns, status) = apply(program, 1);
    assert_eq!(types(&columns), vec![ColumnType::Integer]);
    assert!(status.is_complete());
}

#[test]
fn result_columns_map_from_last_result_row() {
    let program = vec![
        ProgramRow::new("ResultRow", 9, 1, 0),
        ProgramRow::new("Real", 0, 3, 0).with_p4("2.5"),
        ProgramRow::new("String8", 0, 4, 0).with_p4("x"),
        ProgramRow::new("ResultRow", 3, 2, 0),
    ];
    let (columns, _) = apply(program, 2);
    assert_eq!(types(&columns), vec![ColumnType::Real, ColumnType::Text]);
}

#[test]
fn unlisted_opcodes_are_ignored() {
    let program = vec![
        ProgramRow::new("Integer", 1, 1, 0),
        ProgramRow::new("Affinity", 1, 1, 0).with_p4("C"),
        ProgramRow::new("Noop", 0, 0, 0),
        ProgramRow::new("ResultRow", 1, 1, 0),
    ];
    let (columns, _) = apply(program, 1);
    assert_eq!(types(&columns), vec![ColumnType::Integer]);
}

#[test]
fn run_once_constants_seed_body_operands() {
    let program = vec![
        ProgramRow::new("Init", 0, 4, 0),
        ProgramRow::new("Add", 3, 2, 1),
        ProgramRow::new("ResultRow", 1, 1, 0),
        ProgramRow::new("Halt", 0, 0, 0),
        ProgramRow::new("Real", 0, 2, 0).with_p4("1.5"),
        ProgramRow::new("Integer", 1, 3, 0),
        ProgramRow::new("Goto", 0, 1, 0),
    ];
    let (columns, status) = apply(program, 1);
    assert_eq!(types(&columns), vec![ColumnType::Real]);
    assert!(status.is_complete());
}

#[test]
fn body_writes_after_seeding_still_win() {
    let program = vec![
        ProgramRow::new("Init", 0, 4, 0),
        ProgramRow::new("String8", 0, 1, 0).with_p4("a"),
        ProgramRow::new("ResultRow", 1, 1, 0),
        ProgramRow::new("Halt", 0, 0, 0),
        ProgramRow::new("Integer", 7, 1, 0),
        ProgramRow::new("Goto", 0, 1, 0),
    ];
    let (columns, _) = apply(program, 1);
    assert_eq!(types(&columns), vec![ColumnType::Integer]);
}

#[test]
fn missing_result_row_leaves_columns_unknown() {
    let (columns, status) = apply(vec![ProgramRow::new("Integer", 1, 1, 0)], 1);
    assert_eq!(types(&columns), vec![ColumnType::Unknown]);
    assert_eq!(status, TypeResolution::Partial {
        unresolved: vec![0]
    });
}

// ============================================================================
// SECTION: Register Transfers
// ============================================================================

#[test]
fn copies_propagate_types() {
    let program = vec![
        ProgramRow::new("Integer", 1, 1, 0),
        ProgramRow::new("String8", 0, 2, 0).with_p4("a"),
        ProgramRow::new("Copy", 1, 5, 1),
        ProgramRow::new("SCopy", 2, 7, 0),
        ProgramRow::new("ResultRow", 5, 3, 0),
    ];
    let (columns, _) = apply(program, 3);
    assert_eq!(types(&columns), vec![ColumnType::Integer, ColumnType::Text, ColumnType::Text]);
}

#[test]
fn moves_clear_source_registers() {
    let program = vec![
        ProgramRow::new("Integer", 1, 1, 0),
        ProgramRow::new("Move", 1, 2, 1),
        ProgramRow::new("ResultRow", 1, 2, 0),
    ];
    let (columns, status) = apply(program, 2);
    assert_eq!(types(&columns), vec![ColumnType::Unknown, ColumnType::Integer]);
    assert_eq!(status, TypeResolution::Partial {
        unresolved: vec![0]
    });
}

#[test]
fn transfers_near_register_limit_stop_without_overflow() {
    let program = vec![
        ProgramRow::new("Integer", 1, i64::MAX, 0),
        ProgramRow::new("Copy", i64::MAX, 1, 2),
        ProgramRow::new("Move", 1, i64::MAX - 1, 4),
        ProgramRow::new("ResultRow", i64::MAX - 1, 2, 0),
    ];
    let (columns, _) = apply(program, 2);
    assert_eq!(types(&columns), vec![ColumnType::Integer, ColumnType::Unknown]);
}

#[test]
fn copying_untyped_register_clears_destination() {
    let program = vec![
        ProgramRow::new("Integer", 1, 2, 0),
        ProgramRow::new("SCopy", 9, 2, 0),
        ProgramRow::new("ResultRow", 2, 1, 0),
    ];
    let (columns, _) = apply(program, 1);
    assert_eq!(types(&columns), vec![ColumnType::Unknown]);
}

// ============================================================================
// SECTION: Functions and Casts
// ============================================================================

#[test]
fn function_calls_use_return_types() {
    let program = vec![
        ProgramRow::new("Function", 0, 1, 2).with_p4("upper(1)"),
        ProgramRow::new("PureFunc", 0, 1, 3).with_p4("length(1)"),
        ProgramRow::new("AggStep", 0, 1, 6).with_p4("avg(1)"),
        ProgramRow::new("AggFinal", 6, 1, 0).with_p4("avg(1)"),
        ProgramRow::new("SCopy", 6, 4, 0),
        ProgramRow::new("ResultRow", 2, 3, 0),
    ];
    let (columns, _) = apply(program, 3);
    assert_eq!(types(&columns), vec![ColumnType::Text, ColumnType::Integer, ColumnType::Real]);
}

#[test]
fn unknown_functions_clear_register_type() {
    let program = vec![
        ProgramRow::new("Integer", 1, 2, 0),
        ProgramRow::new("Function", 0, 1, 2).with_p4("my_udf(1)"),
        ProgramRow::new("ResultRow", 2, 1, 0),
    ];
    let (columns, _) = apply(program, 1);
    assert_eq!(types(&columns), vec![ColumnType::Unknown]);
}

#[test]
fn argument_typed_functions_follow_first_argument() {
    let program = vec![
        ProgramRow::new("Real", 0, 1, 0).with_p4("2.5"),
        ProgramRow::new("Function", 0, 1, 2).with_p4("abs(1)"),
        ProgramRow::new("Integer", 4, 3, 0),
        ProgramRow::new("AggStep", 0, 3, 5).with_p4("max(1)"),
        ProgramRow::new("AggFinal", 5, 1, 0).with_p4("max(1)"),
        ProgramRow::new("Copy", 5, 3, 0),
        ProgramRow::new("Function", 0, 9, 4).with_p4("abs(1)"),
        ProgramRow::new("ResultRow", 2, 3, 0),
    ];
    let (columns, _) = apply(program, 3);
    assert_eq!(types(&columns), vec![ColumnType::Real, ColumnType::Integer, ColumnType::Unknown]);
}

#[test]
fn arithmetic_follows_operand_types() {
    let program = vec![
        ProgramRow::new("Integer", 1, 1, 0),
        ProgramRow::new("Integer", 2, 2, 0),
        ProgramRow::new("Real", 0, 3, 0).with_p4("0.5"),
        ProgramRow::new("String8", 0, 4, 0).with_p4("x"),
        ProgramRow::new("Add", 1, 2, 5),
        ProgramRow::new("Divide", 3, 1, 6),
        ProgramRow::new("Multiply", 4, 1, 7),
        ProgramRow::new("Remainder", 1, 3, 8),
        ProgramRow::new("ResultRow", 5, 4, 0),
    ];
    let (columns, _) = apply(program, 4);
    assert_eq!(types(&columns), vec![
        ColumnType::Integer,
        ColumnType::Real,
        ColumnType::Unknown,
        ColumnType::Real
    ]);
}

#[test]
fn casts_follow_affinity() {
    let program = vec![
        ProgramRow::new("Integer", 1, 1, 0),
        ProgramRow::new("Cast", 1, 0x42, 0),
        ProgramRow::new("Integer", 1, 2, 0),
        ProgramRow::new("Cast", 2, 0x45, 0),
        ProgramRow::new("ResultRow", 1, 2, 0),
    ];
    let (columns, _) = apply(program, 2);
    assert_eq!(types(&columns), vec![ColumnType::Text, ColumnType::Real]);
}

// ============================================================================
// SECTION: Column Fetches
// ============================================================================

#[test]
fn column_fetches_use_scanned_table_schemas() {
    let program = vec![
        ProgramRow::new("OpenRead", 3, 2, 0).with_p4("k(2,B,)"),
        ProgramRow::new("VOpen", 0, 0, 0).with_p4("vtab:1"),
        ProgramRow::new("OpenRead", 1, 3, 0).with_p4("2"),
        ProgramRow::new("VColumn", 0, 1, 1),
        ProgramRow::new("Column", 1, 0, 2),
        ProgramRow::new("Column", 1, 1, 3),
        ProgramRow::new("Column", 3, 0, 4),
        ProgramRow::new("VColumn", 0, 9, 5),
        ProgramRow::new("ResultRow", 1, 5, 0),
    ];
    let tables = vec!["users".to_string(), "groups".to_string()];
    let planner = QueryPlanner::from_program(tables, program)
        .with_table_schema("users", vec![ColumnType::Integer, ColumnType::Text])
        .with_table_schema("groups", vec![ColumnType::Real, ColumnType::Unknown]);
    let mut columns = unknown_columns(5);
    planner.apply_types(&mut columns);
    assert_eq!(types(&columns), vec![
        ColumnType::Text,
        ColumnType::Real,
        ColumnType::Unknown,
        ColumnType::Unknown,
        ColumnType::Unknown
    ]);
}

#[test]
fn engine_schemas_type_case_expressions() {
    let connection = Connection::open_in_memory().unwrap();
    connection.execute_batch("CREATE TABLE users(uid INTEGER, name TEXT)").unwrap();
    let sql = "SELECT CASE WHEN uid > 0 THEN name END, uid / 2.0 FROM users";
    let planner = QueryPlanner::new(sql, &connection).unwrap();
    assert_eq!(
        planner.table_schema("users"),
        Some([ColumnType::Integer, ColumnType::Text].as_slice())
    );
    let mut columns = unknown_columns(2);
    let status = infer_column_types(sql, &connection, &mut columns).unwrap();
    assert_eq!(types(&columns), vec![ColumnType::Text, ColumnType::Real]);
    assert!(status.is_complete());
}

// ============================================================================
// SECTION: Program Rows
// ============================================================================

#[test]
fn program_rows_parse_from_explain_output() {
    let mut row = Row::new();
    row.insert("addr".to_string(), FieldValue::Integer(3));
    row.insert("opcode".to_string(), FieldValue::from("Function"));
    row.insert("p1".to_string(), FieldValue::Integer(0));
    row.insert("p2".to_string(), FieldValue::Integer(1));
    row.insert("p3".to_string(), FieldValue::Integer(2));
    row.insert("p4".to_string(), FieldValue::from("upper(1)"));
    let parsed = ProgramRow::from_row(&row).unwrap();
    assert_eq!(parsed, ProgramRow::new("Function", 0, 1, 2).with_p4("upper(1)"));

    row.remove("p3");
    assert!(ProgramRow::from_row(&row).is_err());
}

#[test]
fn engine_plans_report_scanned_tables() {
    let connection = Connection::open_in_memory().unwrap();
    connection.execute_batch("CREATE TABLE t(a INTEGER); CREATE TABLE u(b TEXT);").unwrap();
    let planner = QueryPlanner::new("SELECT a, b FROM t, u", &connection).unwrap();
    let mut tables = planner.scanned_tables().to_vec();
    tables.sort();
    assert_eq!(tables, vec!["t".to_string(), "u".to_string()]);
    assert!(planner.program().iter().any(|row| row.opcode == "ResultRow"));
}

#[test]
fn failed_inference_leaves_columns_untouched() {
    let connection = Connection::open_in_memory().unwrap();
    let mut columns = unknown_columns(1);
    assert!(infer_column_types("SELECT FROM nowhere", &connection, &mut columns).is_err());
    assert_eq!(columns, unknown_columns(1));
}

// ============================================================================
// SECTION: Properties
// ============================================================================

/// Strategy over typing and transfer opcodes with small register numbers.
fn program_row() -> impl Strategy<Value = ProgramRow> {
    let opcode = prop::sample::select(vec![
        "Integer", "Real", "String8", "Blob", "Concat", "Add", "Copy", "SCopy", "Move", "Column",
        "Null", "Cast",
    ]);
    (opcode, 0_i64 .. 6, 0_i64 .. 6, 0_i64 .. 3)
        .prop_map(|(opcode, p1, p2, p3)| ProgramRow::new(opcode, p1, p2, p3))
}

proptest! {
    #[test]
    fn known_columns_are_never_modified(
        program in prop::collection::vec(program_row(), 0 .. 24),
        start in 0_i64 .. 4,
    ) {
        let mut program = program;
        program.push(ProgramRow::new("ResultRow", start, 3, 0));
        let planner = QueryPlanner::from_program(Vec::new(), program);
        let mut columns = vec![
            TableColumn::new("a", ColumnType::Blob),
            TableColumn::new("b", ColumnType::Unknown),
            TableColumn::new("c", ColumnType::Text),
        ];
        let status = planner.apply_types(&mut columns);
        prop_assert_eq!(columns[0].column_type, ColumnType::Blob);
        prop_assert_eq!(columns[2].column_type, ColumnType::Text);
        prop_assert_eq!(status.is_complete(), columns[1].column_type.is_known());
    }
}
