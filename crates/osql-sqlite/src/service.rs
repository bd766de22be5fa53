// crates/osql-sqlite/src/service.rs
// ============================================================================
// Module: SQL Service
// Description: SqlPlugin implementation backed by the connection pool.
// Purpose: Serve SQL queries for entry points that only know the interface.
// Dependencies: osql-core
// ============================================================================

//! ## Overview
//! Each call acquires a pooled connection for the duration of that call only.

use std::sync::Arc;

use osql_core::ColumnResolution;
use osql_core::QueryData;
use osql_core::SqlError;
use osql_core::SqlPlugin;

use crate::pool::SqliteDbManager;

/// [`SqlPlugin`] over a shared [`SqliteDbManager`].
#[derive(Clone)]
pub struct SqliteSqlService {
    /// Shared connection pool.
    manager: Arc<SqliteDbManager>,
}

impl SqliteSqlService {
    /// Creates a service over `manager`.
    #[must_use]
    pub const fn new(manager: Arc<SqliteDbManager>) -> Self {
        Self {
            manager,
        }
    }

    /// Returns the shared pool.
    #[must_use]
    pub const fn manager(&self) -> &Arc<SqliteDbManager> {
        &self.manager
    }
}

impl SqlPlugin for SqliteSqlService {
    fn query(&self, sql: &str) -> Result<QueryData, SqlError> {
        self.manager.acquire()?.query(sql)
    }

    fn query_columns(&self, sql: &str) -> Result<ColumnResolution, SqlError> {
        self.manager.acquire()?.query_columns(sql)
    }
}
