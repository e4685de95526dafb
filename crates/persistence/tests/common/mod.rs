//! Shared fixtures for the persistence integration tests.

pub mod fixtures;

pub use fixtures::*;
