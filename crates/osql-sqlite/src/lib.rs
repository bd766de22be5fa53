// crates/osql-sqlite/src/lib.rs
// ============================================================================
// Module: osql SQLite Library
// Description: Embedded SQLite layer serving SQL over registry tables.
// Purpose: Connection pooling, table attachment, and column type inference.
// Dependencies: osql-core, rusqlite, tracing
// ============================================================================

//! ## Overview
//! [`SqliteDbManager`] owns one long-lived in-memory primary connection with
//! every enabled registry table attached as a virtual table. Callers get a
//! [`SqliteDbInstance`] that either holds the primary exclusively or owns a
//! transient connection opened because the primary was busy.
//!
//! Result column types come from declared types first; expression columns
//! are typed by [`QueryPlanner`], which interprets the statement's `EXPLAIN`
//! program.
//! Invariants:
//! - At most one caller uses the primary connection at a time.
//! - Acquisition never waits for the primary.
//! - Disabled tables are never attached to any connection.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod codes;
pub mod config;
pub mod error;
pub mod opcodes;
pub mod planner;
pub mod pool;
pub mod query;
pub mod service;
pub mod vtab;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use codes::describe_return_code;
pub use config::DEFAULT_SOFT_HEAP_LIMIT_BYTES;
pub use config::SqlitePoolConfig;
pub use error::SqliteDbError;
pub use opcodes::FunctionType;
pub use opcodes::OPCODE_SEMANTICS;
pub use opcodes::OpcodeEffect;
pub use opcodes::OpcodeSemantics;
pub use opcodes::Register;
pub use planner::ProgramRow;
pub use planner::ProgramTypes;
pub use planner::QueryPlanner;
pub use planner::infer_column_types;
pub use pool::AttachFailure;
pub use pool::AttachReport;
pub use pool::AttachedDb;
pub use pool::DbConnection;
pub use pool::INFERENCE_CACHE_CAPACITY;
pub use pool::PoolStatsSnapshot;
pub use pool::SqliteDbInstance;
pub use pool::SqliteDbManager;
pub use query::query_columns_internal;
pub use query::query_internal;
pub use query::resolve_column_types;
pub use service::SqliteSqlService;
pub use vtab::is_valid_table_name;
