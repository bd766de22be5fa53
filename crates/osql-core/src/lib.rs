// crates/osql-core/src/lib.rs
// ============================================================================
// Module: osql Core
// Description: Backend-agnostic column, row, and table-registry types.
// Purpose: Share the data model between the SQLite core and its collaborators.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! `osql-core` holds the types that cross the boundary between table
//! providers, the embedded SQLite layer, and query-serving entry points:
//! column type descriptors, result rows, the SQL error taxonomy, the
//! disabled-table filter, and the collaborator interfaces.
//!
//! Nothing in this crate talks to SQLite directly; see `osql-sqlite`.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::columns::ColumnType;
pub use crate::core::columns::TableColumn;
pub use crate::core::columns::TableColumns;
pub use crate::core::disabled::DisabledTables;
pub use crate::core::rows::FieldValue;
pub use crate::core::rows::QueryData;
pub use crate::core::rows::Row;
pub use crate::core::status::ColumnResolution;
pub use crate::core::status::SqlError;
pub use crate::core::status::SqlErrorKind;
pub use crate::core::status::TypeResolution;
pub use crate::interfaces::SqlPlugin;
pub use crate::interfaces::StaticTableRegistry;
pub use crate::interfaces::TableError;
pub use crate::interfaces::TablePlugin;
pub use crate::interfaces::TableRegistry;
