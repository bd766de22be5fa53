// crates/osql-sqlite/tests/common/mod.rs
// ============================================================================
// Module: SQLite Test Fixtures
// Description: Shared table plugins and manager builders for pool tests.
// Purpose: Give integration tests a small, deterministic table set.
// ============================================================================

//! Shared fixtures for `osql-sqlite` integration tests.

#![allow(dead_code, reason = "Each test binary uses a different subset of fixtures.")]

use std::sync::Arc;

use osql_core::ColumnType;
use osql_core::FieldValue;
use osql_core::QueryData;
use osql_core::Row;
use osql_core::StaticTableRegistry;
use osql_core::TableColumn;
use osql_core::TableColumns;
use osql_core::TableError;
use osql_core::TablePlugin;
use osql_sqlite::SqliteDbManager;
use osql_sqlite::SqlitePoolConfig;

/// Users table with a fixed set of rows.
pub struct UsersTable;

impl TablePlugin for UsersTable {
    fn name(&self) -> &str {
        "users"
    }

    fn columns(&self) -> TableColumns {
        vec![
            TableColumn::new("uid", ColumnType::Integer),
            TableColumn::new("name", ColumnType::Text),
            TableColumn::new("shell", ColumnType::Text),
        ]
    }

    fn generate(&self) -> Result<QueryData, TableError> {
        Ok([(0, "root", "/bin/sh"), (1000, "alice", "/bin/zsh"), (1001, "bob", "/bin/bash")]
            .into_iter()
            .map(|(uid, name, shell)| {
                let mut row = Row::new();
                row.insert("uid".to_string(), FieldValue::from(uid));
                row.insert("name".to_string(), FieldValue::from(name));
                row.insert("shell".to_string(), FieldValue::from(shell));
                row
            })
            .collect())
    }
}

/// Table whose name cannot be used as an SQL identifier.
pub struct BadNameTable;

impl TablePlugin for BadNameTable {
    fn name(&self) -> &str {
        "bad name"
    }

    fn columns(&self) -> TableColumns {
        vec![TableColumn::new("value", ColumnType::Text)]
    }

    fn generate(&self) -> Result<QueryData, TableError> {
        Ok(QueryData::new())
    }
}

/// Table whose generation always fails.
pub struct FailingTable;

impl TablePlugin for FailingTable {
    fn name(&self) -> &str {
        "failing"
    }

    fn columns(&self) -> TableColumns {
        vec![TableColumn::new("value", ColumnType::Text)]
    }

    fn generate(&self) -> Result<QueryData, TableError> {
        Err(TableError::Generate("source unavailable".to_string()))
    }
}

/// Builds a manager over the users table.
pub fn users_manager() -> SqliteDbManager {
    manager_with(SqlitePoolConfig::default(), registry())
}

/// Builds a manager over the users table with `disabled` tables.
pub fn manager_with_disabled(disabled: &str) -> SqliteDbManager {
    let config = SqlitePoolConfig {
        disabled_tables: disabled.to_string(),
        ..SqlitePoolConfig::default()
    };
    manager_with(config, registry())
}

/// Builds a manager from explicit parts.
pub fn manager_with(config: SqlitePoolConfig, registry: StaticTableRegistry) -> SqliteDbManager {
    SqliteDbManager::new(config, Arc::new(registry)).expect("valid pool config")
}

/// Registry containing the users table.
pub fn registry() -> StaticTableRegistry {
    StaticTableRegistry::new().with(Arc::new(UsersTable))
}
