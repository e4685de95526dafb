//! # trellis-persistence
//!
//! Turns resolved operation metadata into scoped queries. Identifiers captured from a
//! nested URI are walked back along the operation's links, and every relation becomes a
//! join, an equality predicate or a correlated `IN` subquery on a backend query builder.
//!
//! # Architecture
//!
//! - [`mapping`] - how classes are stored: tables, fields, associations
//! - [`query`] - the builder adapter and its relational and document backends
//! - [`links`] - link resolution and the handler driving it from metadata
//! - [`filter`] - filters applied to document queries
//! - [`backends`] - database backends executing plans (SQLite)
//! - [`error`] - error types for all operations
//!
//! # Example
//!
//! ```
//! use trellis_metadata::Link;
//! use trellis_persistence::links::{IdentifierChain, LinkResolver};
//! use trellis_persistence::mapping::{
//!     AssociationKind, AssociationMapping, ClassMapping, FieldMapping, FieldType,
//!     MappingRegistry,
//! };
//! use trellis_persistence::query::QueryPlan;
//!
//! let mappings = MappingRegistry::new()
//!     .with(ClassMapping::new("Company", "company")
//!         .with_field(FieldMapping::new("id", FieldType::Integer)))?
//!     .with(ClassMapping::new("Employee", "employee")
//!         .with_field(FieldMapping::new("id", FieldType::Integer))
//!         .with_association(AssociationMapping::new(
//!             "company",
//!             AssociationKind::ManyToOne,
//!             "Company",
//!         )))?;
//!
//! // /companies/{companyId}/employees
//! let links = vec![Link::new()
//!     .with_parameter_name("companyId")
//!     .with_from_class("Company")
//!     .with_to_property("company")
//!     .with_identifiers(["id"])];
//! let identifiers = IdentifierChain::new().with("companyId", "1");
//!
//! let mut plan = QueryPlan::new("Employee");
//! LinkResolver::new(&mappings).build_link_predicates(&mut plan, &identifiers, &links, "Employee")?;
//! assert_eq!(
//!     plan.to_dql(),
//!     "SELECT o FROM Employee o INNER JOIN o.company company_a1 WHERE company_a1.id = :id_p2"
//! );
//! # Ok::<(), trellis_persistence::StorageError>(())
//! ```

#![warn(rustdoc::missing_crate_level_docs)]

pub mod backends;
pub mod error;
pub mod filter;
pub mod links;
pub mod mapping;
pub mod query;

pub use error::{BackendError, LinkError, MappingError, StorageError, StorageResult};
pub use filter::{DateFilter, NullManagement};
pub use links::{IdentifierChain, LinkContext, LinkResolver, LinksHandler};
pub use mapping::{ClassMapping, MappingRegistry};
pub use query::{AggregationPlan, LinkQueryBuilder, QueryNameGenerator, QueryPlan};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
