//! Database backend implementations.
//!
//! Each backend is gated behind a feature flag.
//!
//! | Backend | Feature | Description |
//! |---------|---------|-------------|
//! | SQLite | `sqlite` | Embedded database executing relational query plans |
//!
//! Document plans run against any [`DocumentSource`](crate::query::DocumentSource);
//! the in-memory store needs no feature.

#[cfg(feature = "sqlite")]
pub mod sqlite;
