//! Filters applied to document queries after link resolution.

mod date;

pub use date::{DateFilter, DateOperator, NullManagement};
