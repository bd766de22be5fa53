// crates/osql-core/src/core/mod.rs
// ============================================================================
// Module: osql Core Types
// Description: Column, row, status, and disabled-table types.
// Purpose: Group the plain data model shared by all osql crates.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Plain data types with no engine dependencies.

pub mod columns;
pub mod disabled;
pub mod rows;
pub mod status;
