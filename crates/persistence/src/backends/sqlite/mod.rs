//! SQLite backend.
//!
//! Executes relational [`QueryPlan`](crate::query::QueryPlan)s through an `r2d2` pool of
//! `rusqlite` connections. Both in-memory databases (for tests) and file databases are
//! supported.
//!
//! # Example
//!
//! ```no_run
//! use trellis_persistence::backends::sqlite::SqliteExecutor;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let executor = SqliteExecutor::open("./data/app.db")?;
//! executor.execute_batch("CREATE TABLE IF NOT EXISTS company (id INTEGER PRIMARY KEY)")?;
//! # Ok(())
//! # }
//! ```

mod backend;

pub use backend::{SqliteExecutor, SqliteExecutorConfig};
