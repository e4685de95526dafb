//! Shared fixtures for the metadata integration tests.

pub mod fixtures;

pub use fixtures::*;
