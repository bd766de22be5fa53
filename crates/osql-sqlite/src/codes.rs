// crates/osql-sqlite/src/codes.rs
// ============================================================================
// Module: SQLite Return Codes
// Description: Human-readable SQLite result codes and engine error mapping.
// Purpose: Turn engine failures into osql SQL errors with readable context.
// Dependencies: osql-core, rusqlite
// ============================================================================

//! ## Overview
//! [`describe_return_code`] is a pure lookup over SQLite's primary result
//! codes. The error helpers classify rusqlite failures into the osql
//! taxonomy: opening connections is resource allocation, everything else that
//! the engine rejects is query execution.

use osql_core::SqlError;

/// Returns a description of a native SQLite result code.
#[must_use]
pub fn describe_return_code(code: i32) -> String {
    let description = match code {
        0 => "SQLITE_OK: Successful result",
        1 => "SQLITE_ERROR: SQL error or missing database",
        2 => "SQLITE_INTERNAL: Internal logic error in SQLite",
        3 => "SQLITE_PERM: Access permission denied",
        4 => "SQLITE_ABORT: Callback routine requested an abort",
        5 => "SQLITE_BUSY: The database file is locked",
        6 => "SQLITE_LOCKED: A table in the database is locked",
        7 => "SQLITE_NOMEM: A malloc() failed",
        8 => "SQLITE_READONLY: Attempt to write a readonly database",
        9 => "SQLITE_INTERRUPT: Operation terminated by sqlite3_interrupt()",
        10 => "SQLITE_IOERR: Some kind of disk I/O error occurred",
        11 => "SQLITE_CORRUPT: The database disk image is malformed",
        12 => "SQLITE_NOTFOUND: Unknown opcode in sqlite3_file_control()",
        13 => "SQLITE_FULL: Insertion failed because database is full",
        14 => "SQLITE_CANTOPEN: Unable to open the database file",
        15 => "SQLITE_PROTOCOL: Database lock protocol error",
        16 => "SQLITE_EMPTY: Database is empty",
        17 => "SQLITE_SCHEMA: The database schema changed",
        18 => "SQLITE_TOOBIG: String or BLOB exceeds size limit",
        19 => "SQLITE_CONSTRAINT: Abort due to constraint violation",
        20 => "SQLITE_MISMATCH: Data type mismatch",
        21 => "SQLITE_MISUSE: Library used incorrectly",
        22 => "SQLITE_NOLFS: Uses OS features not supported on host",
        23 => "SQLITE_AUTH: Authorization denied",
        24 => "SQLITE_FORMAT: Auxiliary database format error",
        25 => "SQLITE_RANGE: 2nd parameter to sqlite3_bind out of range",
        26 => "SQLITE_NOTADB: File opened that is not a database file",
        27 => "SQLITE_NOTICE: Notifications from sqlite3_log()",
        28 => "SQLITE_WARNING: Warnings from sqlite3_log()",
        100 => "SQLITE_ROW: sqlite3_step() has another row ready",
        101 => "SQLITE_DONE: sqlite3_step() has finished executing",
        _ => return format!("Error: {code} is not a valid SQLite result code"),
    };
    description.to_string()
}

/// Formats a rusqlite error with the primary result code description.
fn engine_message(error: &rusqlite::Error) -> String {
    match error {
        rusqlite::Error::SqliteFailure(failure, message) => {
            let primary = failure.extended_code & 0xff;
            let detail = message.clone().unwrap_or_else(|| failure.to_string());
            format!("{detail} ({})", describe_return_code(primary))
        }
        other => other.to_string(),
    }
}

/// Maps a statement failure to [`SqlError::QueryExecution`].
pub(crate) fn execution_error(error: &rusqlite::Error) -> SqlError {
    SqlError::QueryExecution(engine_message(error))
}

/// Maps a connection setup failure to [`SqlError::ResourceAllocation`].
pub(crate) fn allocation_error(error: &rusqlite::Error) -> SqlError {
    SqlError::ResourceAllocation(engine_message(error))
}

#[cfg(test)]
mod tests {
    use super::describe_return_code;

    #[test]
    fn known_codes_are_described() {
        assert_eq!(describe_return_code(0), "SQLITE_OK: Successful result");
        assert!(describe_return_code(5).starts_with("SQLITE_BUSY"));
        assert!(describe_return_code(101).starts_with("SQLITE_DONE"));
    }

    #[test]
    fn unknown_codes_are_reported() {
        assert_eq!(describe_return_code(-1), "Error: -1 is not a valid SQLite result code");
        assert_eq!(describe_return_code(29), "Error: 29 is not a valid SQLite result code");
    }
}
