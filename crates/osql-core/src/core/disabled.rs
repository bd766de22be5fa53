// crates/osql-core/src/core/disabled.rs
// ============================================================================
// Module: Disabled Tables
// Description: Parsed set of table names excluded by configuration.
// Purpose: Answer table-disabled lookups before attachment or execution.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! The disabled-table list arrives as one comma-delimited string. Entries are
//! trimmed and empty entries dropped; lookups are exact and case-sensitive.
//! The set is built once and never mutated afterwards.

use std::collections::BTreeSet;

use serde::Serialize;

/// Immutable set of disabled table names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DisabledTables {
    /// Disabled table names.
    names: BTreeSet<String>,
}

impl DisabledTables {
    /// Parses a comma-delimited list of table names.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let names = raw
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();
        Self {
            names,
        }
    }

    /// Returns true when `name` is disabled.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Returns true when nothing is disabled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Iterates disabled names in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}
