// crates/osql-config/src/lib.rs
// ============================================================================
// Module: osql Config Library
// Description: Configuration model and loading for osql.
// Purpose: Single source of truth for osql.toml semantics.
// Dependencies: osql-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `osql-config` loads `osql.toml`: the SQLite pool settings consumed once at
//! pool creation and the log filter used by the command-line entry point.
//! Loading is strict and fails closed on oversized, non-UTF-8, or unknown
//! input.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::CONFIG_ENV_VAR;
pub use config::ConfigError;
pub use config::DEFAULT_LOG_FILTER;
pub use config::LoggingConfig;
pub use config::MAX_CONFIG_FILE_SIZE;
pub use config::OsqlConfig;
