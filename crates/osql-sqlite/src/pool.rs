// crates/osql-sqlite/src/pool.rs
// ============================================================================
// Module: SQLite Connection Pool
// Description: Primary-versus-transient connection arbitration.
// Purpose: Share one attached connection without ever blocking callers.
// Dependencies: osql-core, rusqlite, serde, tracing
// ============================================================================

//! ## Overview
//! [`SqliteDbManager`] owns a single long-lived primary connection with every
//! registry table attached. [`SqliteDbManager::acquire`] tries the primary's
//! lock without blocking: on success the caller gets exclusive use of the
//! primary until the returned [`SqliteDbInstance`] is dropped; on contention
//! the caller gets a brand-new transient connection with the same table set.
//! Nobody waits for the primary.
//!
//! ## Invariants
//! - At most one live instance holds [`DbConnection::Primary`] at any time.
//! - The primary is created once, under the creation lock; its one-time setup
//!   (soft heap limit) runs exactly once per manager.
//! - Transient connections share no native state with the primary or with
//!   each other.
//! - The disabled-table set is parsed once at construction and never changes.
//! - A table that fails to attach is recorded in the connection's
//!   [`AttachReport`]; the connection is still returned.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::OnceLock;
use std::sync::PoisonError;
use std::sync::TryLockError;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use osql_core::ColumnResolution;
use osql_core::ColumnType;
use osql_core::DisabledTables;
use osql_core::QueryData;
use osql_core::SqlError;
use osql_core::TableColumns;
use osql_core::TableRegistry;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::warn;

use crate::codes::allocation_error;
use crate::config::SqlitePoolConfig;
use crate::error::SqliteDbError;
use crate::query::query_internal;
use crate::planner::infer_column_types;
use crate::query::query_columns_internal;
use crate::vtab::attach_table;
use crate::vtab::detach_table;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Engine message prefix for references to missing tables.
const NO_SUCH_TABLE_PREFIX: &str = "no such table: ";

/// Maximum number of inferred column type lists remembered per manager.
pub const INFERENCE_CACHE_CAPACITY: usize = 256;

// ============================================================================
// SECTION: Attach Report
// ============================================================================

/// Table attachment failure for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachFailure {
    /// Table name.
    pub table: String,
    /// Failure description.
    pub reason: String,
}

/// Outcome of wiring the registry's tables onto one connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachReport {
    /// Tables attached and queryable.
    pub attached: Vec<String>,
    /// Tables skipped because they are disabled.
    pub disabled: Vec<String>,
    /// Tables that failed to attach.
    pub failed: Vec<AttachFailure>,
}

impl AttachReport {
    /// Returns true when no table failed to attach.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Returns true when `name` is currently attached.
    #[must_use]
    pub fn is_attached(&self, name: &str) -> bool {
        self.attached.iter().any(|attached| attached == name)
    }
}

// ============================================================================
// SECTION: Attached Connection
// ============================================================================

/// A native connection together with its attached tables.
pub struct AttachedDb {
    /// Manager-unique connection identifier.
    id: u64,
    /// Native connection.
    connection: Connection,
    /// Attachment outcome for the registry tables.
    report: AttachReport,
    /// Module names registered on this connection.
    modules: BTreeSet<String>,
}

impl AttachedDb {
    /// Returns the manager-unique connection identifier.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Returns the native connection.
    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Returns the attachment report.
    #[must_use]
    pub const fn report(&self) -> &AttachReport {
        &self.report
    }
}

// ============================================================================
// SECTION: Stats
// ============================================================================

/// Atomic pool counters.
#[derive(Debug, Default)]
struct PoolCounters {
    /// One-time primary setups performed.
    primary_initializations: AtomicU64,
    /// Successful primary acquisitions.
    primary_acquisitions: AtomicU64,
    /// Transient connections opened because the primary was busy.
    transient_connections: AtomicU64,
    /// Transient connections opened by `acquire_unique`.
    unique_connections: AtomicU64,
    /// Individual table attachment failures.
    attach_failures: AtomicU64,
    /// Planner-based type inference runs.
    inference_runs: AtomicU64,
    /// Column types served from the inference cache.
    inference_cache_hits: AtomicU64,
}

/// Snapshot of pool counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStatsSnapshot {
    /// One-time primary setups performed.
    pub primary_initializations: u64,
    /// Successful primary acquisitions.
    pub primary_acquisitions: u64,
    /// Transient connections opened because the primary was busy.
    pub transient_connections: u64,
    /// Transient connections opened by `acquire_unique`.
    pub unique_connections: u64,
    /// Individual table attachment failures.
    pub attach_failures: u64,
    /// Planner-based type inference runs.
    pub inference_runs: u64,
    /// Column types served from the inference cache.
    pub inference_cache_hits: u64,
}

// ============================================================================
// SECTION: Manager
// ============================================================================

/// Owner of the primary connection and arbiter of connection requests.
///
/// Construct one per process with [`SqliteDbManager::new`], share it behind an
/// [`Arc`], and tear it down with [`SqliteDbManager::close`].
pub struct SqliteDbManager {
    /// Pool configuration.
    config: SqlitePoolConfig,
    /// Table implementations attached to every connection.
    registry: Arc<dyn TableRegistry>,
    /// Tables excluded from attachment.
    disabled: DisabledTables,
    /// Lazily created primary connection guarded by the contention lock.
    primary: OnceLock<Mutex<AttachedDb>>,
    /// Serializes one-time primary creation.
    creation: Mutex<()>,
    /// Next connection identifier.
    next_id: AtomicU64,
    /// Inferred column types keyed by statement text.
    inference_cache: Mutex<BTreeMap<String, Vec<ColumnType>>>,
    /// Pool counters.
    counters: PoolCounters,
}

impl SqliteDbManager {
    /// Creates a manager; no connection is opened until the first request.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteDbError::Invalid`] when the configuration is invalid.
    pub fn new(
        config: SqlitePoolConfig,
        registry: Arc<dyn TableRegistry>,
    ) -> Result<Self, SqliteDbError> {
        config.validate()?;
        let disabled = DisabledTables::parse(&config.disabled_tables);
        Ok(Self {
            config,
            registry,
            disabled,
            primary: OnceLock::new(),
            creation: Mutex::new(()),
            next_id: AtomicU64::new(1),
            inference_cache: Mutex::new(BTreeMap::new()),
            counters: PoolCounters::default(),
        })
    }

    /// Returns a connection, preferring the primary when it is free.
    ///
    /// Never blocks on the primary: if another caller holds it, a transient
    /// connection with the same tables is opened instead.
    ///
    /// # Errors
    ///
    /// Returns [`SqlError::ResourceAllocation`] when a native connection
    /// cannot be opened.
    pub fn acquire(&self) -> Result<SqliteDbInstance<'_>, SqlError> {
        let primary = self.primary()?;
        let guard = match primary.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => {
                warn!("primary sqlite connection lock was poisoned; recovering");
                poisoned.into_inner()
            }
            Err(TryLockError::WouldBlock) => {
                self.counters.transient_connections.fetch_add(1, Ordering::Relaxed);
                let db = self.open_attached()?;
                debug!(connection_id = db.id, "primary sqlite connection busy; using transient");
                return Ok(self.instance(DbConnection::Transient(db)));
            }
        };
        self.counters.primary_acquisitions.fetch_add(1, Ordering::Relaxed);
        Ok(self.instance(DbConnection::Primary(guard)))
    }

    /// Returns a fresh transient connection, bypassing the primary.
    ///
    /// # Errors
    ///
    /// Returns [`SqlError::ResourceAllocation`] when a native connection
    /// cannot be opened.
    pub fn acquire_unique(&self) -> Result<SqliteDbInstance<'_>, SqlError> {
        self.counters.unique_connections.fetch_add(1, Ordering::Relaxed);
        let db = self.open_attached()?;
        debug!(connection_id = db.id, "opened unique sqlite connection");
        Ok(self.instance(DbConnection::Transient(db)))
    }

    /// Returns true when `name` is disabled by configuration.
    #[must_use]
    pub fn is_table_disabled(&self, name: &str) -> bool {
        self.disabled.contains(name)
    }

    /// Returns the parsed disabled-table set.
    #[must_use]
    pub const fn disabled_tables(&self) -> &DisabledTables {
        &self.disabled
    }

    /// Returns the pool configuration.
    #[must_use]
    pub const fn config(&self) -> &SqlitePoolConfig {
        &self.config
    }

    /// Returns a snapshot of the pool counters.
    #[must_use]
    pub fn stats(&self) -> PoolStatsSnapshot {
        let counters = &self.counters;
        PoolStatsSnapshot {
            primary_initializations: counters.primary_initializations.load(Ordering::Relaxed),
            primary_acquisitions: counters.primary_acquisitions.load(Ordering::Relaxed),
            transient_connections: counters.transient_connections.load(Ordering::Relaxed),
            unique_connections: counters.unique_connections.load(Ordering::Relaxed),
            attach_failures: counters.attach_failures.load(Ordering::Relaxed),
            inference_runs: counters.inference_runs.load(Ordering::Relaxed),
            inference_cache_hits: counters.inference_cache_hits.load(Ordering::Relaxed),
        }
    }

    /// Closes the primary connection, if one was created.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteDbError::Sql`] when the engine refuses to close the
    /// primary connection.
    pub fn close(self) -> Result<(), SqliteDbError> {
        let Some(primary) = self.primary.into_inner() else {
            return Ok(());
        };
        let db = primary.into_inner().unwrap_or_else(PoisonError::into_inner);
        debug!(connection_id = db.id, "closing primary sqlite connection");
        db.connection.close().map_err(|(_, err)| SqliteDbError::Sql(allocation_error(&err)))
    }

    /// Returns the primary connection, creating it on first use.
    fn primary(&self) -> Result<&Mutex<AttachedDb>, SqlError> {
        if let Some(primary) = self.primary.get() {
            return Ok(primary);
        }
        let _creation = self.creation.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(primary) = self.primary.get() {
            return Ok(primary);
        }
        let db = self.open_attached()?;
        let heap_limit = i64::try_from(self.config.soft_heap_limit_bytes).map_err(|_| {
            SqlError::ResourceAllocation("soft heap limit exceeds i64 range".to_string())
        })?;
        let applied: i64 = db
            .connection
            .query_row(&format!("PRAGMA soft_heap_limit = {heap_limit}"), [], |row| row.get(0))
            .map_err(|err| allocation_error(&err))?;
        self.counters.primary_initializations.fetch_add(1, Ordering::Relaxed);
        debug!(
            connection_id = db.id,
            soft_heap_limit = applied,
            attached = db.report.attached.len(),
            "initialized primary sqlite connection"
        );
        Ok(self.primary.get_or_init(|| Mutex::new(db)))
    }

    /// Opens a native in-memory connection and attaches every enabled table.
    fn open_attached(&self) -> Result<AttachedDb, SqlError> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
        let connection =
            Connection::open_in_memory_with_flags(flags).map_err(|err| allocation_error(&err))?;
        connection
            .busy_timeout(Duration::from_millis(self.config.busy_timeout_ms))
            .map_err(|err| allocation_error(&err))?;
        let mut db = AttachedDb {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            connection,
            report: AttachReport::default(),
            modules: BTreeSet::new(),
        };
        for name in self.registry.table_names() {
            if self.disabled.contains(&name) {
                debug!(table = %name, "skipping disabled table");
                db.report.disabled.push(name);
                continue;
            }
            let outcome = match self.registry.table(&name) {
                Some(plugin) => attach_table(&db.connection, &plugin, &mut db.modules),
                None => Err(SqlError::TableNotFound(name.clone())),
            };
            match outcome {
                Ok(()) => db.report.attached.push(name),
                Err(err) => {
                    self.counters.attach_failures.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        table = %name,
                        connection_id = db.id,
                        error = %err,
                        "table attachment failed"
                    );
                    db.report.failed.push(AttachFailure {
                        table: name,
                        reason: err.to_string(),
                    });
                }
            }
        }
        Ok(db)
    }

    /// Wraps a connection in an instance bound to this manager.
    const fn instance<'pool>(
        &'pool self,
        connection: DbConnection<'pool>,
    ) -> SqliteDbInstance<'pool> {
        SqliteDbInstance {
            manager: self,
            connection,
        }
    }

    /// Returns the cached inferred types for `sql` when they cover `count` columns.
    fn cached_types(&self, sql: &str, count: usize) -> Option<Vec<ColumnType>> {
        let cache = self.inference_cache.lock().unwrap_or_else(PoisonError::into_inner);
        let types = cache.get(sql).filter(|types| types.len() == count).cloned()?;
        self.counters.inference_cache_hits.fetch_add(1, Ordering::Relaxed);
        Some(types)
    }

    /// Remembers the inferred column types for `sql`.
    ///
    /// # Invariants
    /// - The cache never holds more than [`INFERENCE_CACHE_CAPACITY`] entries;
    ///   a full cache is emptied before inserting.
    fn remember_types(&self, sql: &str, columns: &TableColumns) {
        let mut cache = self.inference_cache.lock().unwrap_or_else(PoisonError::into_inner);
        if cache.len() >= INFERENCE_CACHE_CAPACITY && !cache.contains_key(sql) {
            debug!(entries = cache.len(), "inference cache full; clearing");
            cache.clear();
        }
        cache.insert(sql.to_string(), columns.iter().map(|column| column.column_type).collect());
    }

    /// Rewrites a missing-table failure for a disabled table as `TableDisabled`.
    fn classify_missing_table(&self, error: SqlError) -> SqlError {
        let SqlError::QueryExecution(message) = &error else {
            return error;
        };
        let Some(start) = message.find(NO_SUCH_TABLE_PREFIX) else {
            return error;
        };
        let reference = message[start + NO_SUCH_TABLE_PREFIX.len() ..]
            .split(|c: char| c.is_whitespace())
            .next()
            .unwrap_or_default();
        let table = reference.rsplit('.').next().unwrap_or(reference);
        if self.is_table_disabled(table) {
            SqlError::TableDisabled(table.to_string())
        } else {
            error
        }
    }
}

// ============================================================================
// SECTION: Connection Handle
// ============================================================================

/// Either exclusive use of the primary or an owned transient connection.
pub enum DbConnection<'pool> {
    /// The primary connection; the lock is held until this value drops.
    Primary(MutexGuard<'pool, AttachedDb>),
    /// An independent connection closed when this value drops.
    Transient(AttachedDb),
}

impl DbConnection<'_> {
    /// Returns the underlying attached connection.
    #[must_use]
    pub fn db(&self) -> &AttachedDb {
        match self {
            Self::Primary(guard) => &**guard,
            Self::Transient(db) => db,
        }
    }

    /// Returns the underlying attached connection mutably.
    fn db_mut(&mut self) -> &mut AttachedDb {
        match self {
            Self::Primary(guard) => &mut **guard,
            Self::Transient(db) => db,
        }
    }
}

/// Scoped connection handed out by [`SqliteDbManager`].
///
/// Dropping the instance releases the primary lock or closes the transient
/// connection, on every exit path.
pub struct SqliteDbInstance<'pool> {
    /// Issuing manager.
    manager: &'pool SqliteDbManager,
    /// Held connection.
    connection: DbConnection<'pool>,
}

impl<'pool> SqliteDbInstance<'pool> {
    /// Returns true when this instance holds the primary connection.
    #[must_use]
    pub const fn is_primary(&self) -> bool {
        matches!(self.connection, DbConnection::Primary(_))
    }

    /// Returns the manager-unique connection identifier.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.connection.db().id
    }

    /// Returns the held connection variant.
    #[must_use]
    pub const fn kind(&self) -> &DbConnection<'pool> {
        &self.connection
    }

    /// Returns the native connection. Do not retain references past the instance.
    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.connection.db().connection
    }

    /// Returns the attachment report for this connection.
    #[must_use]
    pub fn attach_report(&self) -> &AttachReport {
        &self.connection.db().report
    }

    /// Executes `sql` on this connection.
    ///
    /// # Errors
    ///
    /// Returns [`SqlError::TableDisabled`] when the statement references a
    /// disabled table, otherwise [`SqlError::QueryExecution`] on engine failure.
    pub fn query(&self, sql: &str) -> Result<QueryData, SqlError> {
        query_internal(sql, self.connection())
            .map_err(|err| self.manager.classify_missing_table(err))
    }

    /// Resolves the result column types of `sql`, inferring unresolved ones.
    ///
    /// The statement is always prepared on this connection first. Inferred
    /// types are cached per statement text on the manager, so the planner
    /// runs at most once for a given statement.
    ///
    /// # Errors
    ///
    /// Returns [`SqlError`] when the statement or an introspection query fails.
    pub fn query_columns(&self, sql: &str) -> Result<ColumnResolution, SqlError> {
        let mut columns = query_columns_internal(sql, self.connection())
            .map_err(|err| self.manager.classify_missing_table(err))?;
        if columns.iter().all(|column| column.column_type.is_known()) {
            return Ok(ColumnResolution::new(columns));
        }
        if let Some(types) = self.manager.cached_types(sql, columns.len()) {
            for (column, column_type) in columns.iter_mut().zip(types) {
                if !column.column_type.is_known() {
                    column.column_type = column_type;
                }
            }
            return Ok(ColumnResolution::new(columns));
        }
        infer_column_types(sql, self.connection(), &mut columns)
            .map_err(|err| self.manager.classify_missing_table(err))?;
        self.manager.counters.inference_runs.fetch_add(1, Ordering::Relaxed);
        self.manager.remember_types(sql, &columns);
        Ok(ColumnResolution::new(columns))
    }

    /// Attaches a registry table to this connection only.
    ///
    /// # Errors
    ///
    /// Returns [`SqlError::TableDisabled`] for disabled tables,
    /// [`SqlError::TableNotFound`] for unregistered ones, and
    /// [`SqlError::ResourceAllocation`] when the engine rejects the table.
    pub fn attach_table(&mut self, name: &str) -> Result<(), SqlError> {
        if self.manager.is_table_disabled(name) {
            return Err(SqlError::TableDisabled(name.to_string()));
        }
        let plugin = self
            .manager
            .registry
            .table(name)
            .ok_or_else(|| SqlError::TableNotFound(name.to_string()))?;
        let db = self.connection.db_mut();
        attach_table(&db.connection, &plugin, &mut db.modules)?;
        if !db.report.is_attached(name) {
            db.report.attached.push(name.to_string());
        }
        db.report.failed.retain(|failure| failure.table != name);
        Ok(())
    }

    /// Detaches a table from this connection only.
    ///
    /// # Errors
    ///
    /// Returns [`SqlError`] when the engine fails to drop the table.
    pub fn detach_table(&mut self, name: &str) -> Result<(), SqlError> {
        let db = self.connection.db_mut();
        detach_table(&db.connection, name)?;
        db.report.attached.retain(|attached| attached != name);
        Ok(())
    }

    /// Releases the instance now instead of at scope end.
    pub fn release(self) {
        match self.connection {
            DbConnection::Primary(guard) => {
                debug!(connection_id = guard.id, "released primary sqlite connection");
                drop(guard);
            }
            DbConnection::Transient(db) => {
                let id = db.id;
                if let Err((_, err)) = db.connection.close() {
                    warn!(connection_id = id, error = %err, "transient sqlite connection close failed");
                }
            }
        }
    }
}
