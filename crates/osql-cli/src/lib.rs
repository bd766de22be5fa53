// crates/osql-cli/src/lib.rs
// ============================================================================
// Module: osql CLI Library
// Description: Built-in tables served by the osql command-line tool.
// Purpose: Share the CLI table registry with tests.
// Dependencies: osql-core, osql-sqlite
// ============================================================================

//! ## Overview
//! The `osql` binary queries a small fixed set of tables defined here. They
//! exist to exercise the SQLite layer end to end, not to be a table catalog.

pub mod tables;

pub use tables::builtin_registry;
