//! SQLite execution of relational query plans.

use std::fmt::Debug;
use std::path::Path;
use std::time::Duration;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::ToSql;
use rusqlite::types::ValueRef;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{BackendError, StorageError, StorageResult};
use crate::mapping::MappingRegistry;
use crate::query::{QueryPlan, SqlFragment, SqlParam};

const BACKEND: &str = "sqlite";

/// Runs relational plans against a SQLite database.
pub struct SqliteExecutor {
    pool: Pool<SqliteConnectionManager>,
    config: SqliteExecutorConfig,
    is_memory: bool,
}

impl Debug for SqliteExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteExecutor")
            .field("config", &self.config)
            .field("is_memory", &self.is_memory)
            .finish_non_exhaustive()
    }
}

/// Pool and connection settings of a [`SqliteExecutor`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SqliteExecutorConfig {
    #[serde(default = "SqliteExecutorConfig::default_pool_size")]
    pub pool_size: u32,

    /// How long to wait for a pooled connection, in milliseconds.
    #[serde(default = "SqliteExecutorConfig::default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,

    /// How long a statement waits on a locked database, in milliseconds.
    #[serde(default = "SqliteExecutorConfig::default_busy_timeout_ms")]
    pub busy_timeout_ms: u32,

    #[serde(default = "SqliteExecutorConfig::default_foreign_keys")]
    pub foreign_keys: bool,
}

impl SqliteExecutorConfig {
    fn default_pool_size() -> u32 {
        4
    }

    fn default_acquire_timeout_ms() -> u64 {
        10_000
    }

    fn default_busy_timeout_ms() -> u32 {
        5_000
    }

    fn default_foreign_keys() -> bool {
        true
    }
}

impl Default for SqliteExecutorConfig {
    fn default() -> Self {
        Self {
            pool_size: Self::default_pool_size(),
            acquire_timeout_ms: Self::default_acquire_timeout_ms(),
            busy_timeout_ms: Self::default_busy_timeout_ms(),
            foreign_keys: Self::default_foreign_keys(),
        }
    }
}

fn connection_failed(e: impl ToString) -> StorageError {
    StorageError::Backend(BackendError::ConnectionFailed {
        backend_name: BACKEND.to_string(),
        message: e.to_string(),
    })
}

fn query_failed(context: &str, e: impl std::fmt::Display) -> StorageError {
    BackendError::query_failed(BACKEND, format!("{}: {}", context, e)).into()
}

impl SqliteExecutor {
    /// Creates an executor over a private in-memory database.
    ///
    /// Every connection to `:memory:` opens a distinct database, so the pool holds a
    /// single connection.
    pub fn in_memory() -> StorageResult<Self> {
        let config = SqliteExecutorConfig {
            pool_size: 1,
            ..SqliteExecutorConfig::default()
        };
        Self::with_config(":memory:", config)
    }

    /// Opens `path`, creating the database file when missing.
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        Self::with_config(path, SqliteExecutorConfig::default())
    }

    /// Creates an executor with custom configuration.
    pub fn with_config<P: AsRef<Path>>(
        path: P,
        config: SqliteExecutorConfig,
    ) -> StorageResult<Self> {
        let is_memory = path.as_ref().to_string_lossy() == ":memory:";
        let busy_timeout = Duration::from_millis(u64::from(config.busy_timeout_ms));
        let foreign_keys = config.foreign_keys;
        let manager = SqliteConnectionManager::file(path.as_ref()).with_init(move |conn| {
            conn.busy_timeout(busy_timeout)?;
            conn.pragma_update(None, "foreign_keys", foreign_keys)
        });

        let pool = Pool::builder()
            .max_size(config.pool_size)
            .min_idle(Some(1))
            .connection_timeout(Duration::from_millis(config.acquire_timeout_ms))
            .build(manager)
            .map_err(connection_failed)?;

        Ok(Self {
            pool,
            config,
            is_memory,
        })
    }

    pub(crate) fn get_connection(
        &self,
    ) -> StorageResult<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(connection_failed)
    }

    pub fn is_memory(&self) -> bool {
        self.is_memory
    }

    pub fn config(&self) -> &SqliteExecutorConfig {
        &self.config
    }

    /// Runs one or more statements, typically schema and fixtures.
    pub fn execute_batch(&self, sql: &str) -> StorageResult<()> {
        let conn = self.get_connection()?;
        conn.execute_batch(sql)
            .map_err(|e| query_failed("Failed to execute batch", e))
    }

    /// Renders `plan` to SQL and returns the matching rows of the root table, one JSON
    /// object per row keyed by column name.
    pub fn fetch(&self, plan: &QueryPlan, mappings: &MappingRegistry) -> StorageResult<Vec<Value>> {
        let fragment = plan.to_sql(mappings)?;
        self.query(&fragment)
    }

    /// Runs a rendered fragment.
    pub fn query(&self, fragment: &SqlFragment) -> StorageResult<Vec<Value>> {
        debug!(sql = %fragment.sql, params = fragment.params.len(), "Executing query");
        let conn = self.get_connection()?;
        let mut stmt = conn
            .prepare(&fragment.sql)
            .map_err(|e| query_failed("Failed to prepare statement", e))?;

        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let params: Vec<Box<dyn ToSql>> = fragment.params.iter().map(to_sql).collect();
        let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), |row| {
                let mut object = Map::new();
                for (i, column) in columns.iter().enumerate() {
                    object.insert(column.clone(), to_json(row.get_ref(i)?));
                }
                Ok(Value::Object(object))
            })
            .map_err(|e| query_failed("Failed to run query", e))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| query_failed("Failed to read row", e))
    }
}

fn to_sql(param: &SqlParam) -> Box<dyn ToSql> {
    match param {
        SqlParam::String(s) => Box::new(s.clone()),
        SqlParam::Integer(i) => Box::new(*i),
        SqlParam::Float(f) => Box::new(*f),
        SqlParam::Null => Box::new(rusqlite::types::Null),
    }
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Value::from(f),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Array(bytes.iter().map(|b| Value::from(*b)).collect()),
    }
}
