// crates/osql-core/src/interfaces/mod.rs
// ============================================================================
// Module: osql Interfaces
// Description: Collaborator interfaces for table providers and SQL services.
// Purpose: Define the seams between table implementations and the engine.
// Dependencies: crate::core, thiserror
// ============================================================================

//! ## Overview
//! A [`TablePlugin`] produces the rows of one table. A [`TableRegistry`]
//! resolves table names to plugins and is consulted every time a connection
//! is created so that every connection exposes the same table set. A
//! [`SqlPlugin`] is the query-serving surface dispatched by the outer plugin
//! framework.
//!
//! Implementations are shared across threads and must be `Send + Sync`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;

use crate::core::columns::TableColumns;
use crate::core::rows::QueryData;
use crate::core::status::ColumnResolution;
use crate::core::status::SqlError;

// ============================================================================
// SECTION: Table Plugin
// ============================================================================

/// Table generation errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TableError {
    /// The table failed to produce rows.
    #[error("table generation failed: {0}")]
    Generate(String),
}

/// Row source for a single table.
pub trait TablePlugin: Send + Sync {
    /// Returns the table name.
    fn name(&self) -> &str;

    /// Returns the declared columns in table order.
    fn columns(&self) -> TableColumns;

    /// Produces the current rows.
    ///
    /// Rows are keyed by column name; missing keys read as `NULL`.
    ///
    /// # Errors
    ///
    /// Returns [`TableError`] when the rows cannot be produced.
    fn generate(&self) -> Result<QueryData, TableError>;
}

// ============================================================================
// SECTION: Table Registry
// ============================================================================

/// Resolves table names to plugins.
pub trait TableRegistry: Send + Sync {
    /// Returns every registered table name in a stable order.
    fn table_names(&self) -> Vec<String>;

    /// Returns the plugin registered under `name`.
    fn table(&self, name: &str) -> Option<Arc<dyn TablePlugin>>;
}

/// Registry backed by an in-memory map.
///
/// # Invariants
/// - Table names are unique; registering a name twice replaces the plugin.
#[derive(Default, Clone)]
pub struct StaticTableRegistry {
    /// Plugins keyed by table name.
    tables: BTreeMap<String, Arc<dyn TablePlugin>>,
}

impl StaticTableRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a plugin under its own name.
    pub fn register(&mut self, plugin: Arc<dyn TablePlugin>) {
        self.tables.insert(plugin.name().to_string(), plugin);
    }

    /// Builder-style [`StaticTableRegistry::register`].
    #[must_use]
    pub fn with(mut self, plugin: Arc<dyn TablePlugin>) -> Self {
        self.register(plugin);
        self
    }

    /// Returns the number of registered tables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Returns true when no tables are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl TableRegistry for StaticTableRegistry {
    fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    fn table(&self, name: &str) -> Option<Arc<dyn TablePlugin>> {
        self.tables.get(name).cloned()
    }
}

// ============================================================================
// SECTION: SQL Plugin
// ============================================================================

/// Query-serving surface for the "sql" registry.
pub trait SqlPlugin: Send + Sync {
    /// Executes `sql` and returns its rows.
    ///
    /// # Errors
    ///
    /// Returns [`SqlError`] when no connection is available or the statement fails.
    fn query(&self, sql: &str) -> Result<QueryData, SqlError>;

    /// Returns the result columns of `sql` with their types.
    ///
    /// # Errors
    ///
    /// Returns [`SqlError`] when no connection is available or introspection fails.
    fn query_columns(&self, sql: &str) -> Result<ColumnResolution, SqlError>;
}
