//! Query building.
//!
//! [`LinkQueryBuilder`] is the seam between link resolution and the backends:
//! [`QueryPlan`] targets relational stores and [`AggregationPlan`] document stores.

pub mod builder;
pub mod document;
pub mod memory;
pub mod name_generator;
pub mod relational;
pub mod sql;
pub mod value;

pub use builder::{
    Binding, Condition, CorrelatedSubquery, FieldRef, Join, JoinTarget, LinkQueryBuilder,
};
pub use document::{AggregationPlan, Feed, PipelineNode};
pub use memory::{DocumentSource, InMemoryDocumentStore};
pub use name_generator::QueryNameGenerator;
pub use relational::{Predicate, QueryPlan, ROOT_ALIAS};
pub use sql::{SqlFragment, SqlParam};
pub use value::{QueryValue, parse_datetime};
