//! # trellis-metadata
//!
//! Resource metadata for Trellis: the model ([`ResourceDescriptor`], [`Operation`],
//! [`Link`]), the sources declared metadata is read from, and the prioritized pipeline
//! that resolves a class into a complete, cached descriptor.
//!
//! ## Example
//!
//! ```
//! use trellis_metadata::{
//!     DeclaredResources, MetadataConfig, MetadataPipeline, ResourceDescriptor,
//!     ResourceMetadataFactory,
//! };
//!
//! let declared = DeclaredResources::new()
//!     .with(ResourceDescriptor::new("App\\Entity\\Company"))
//!     .unwrap();
//! let pipeline = MetadataPipeline::builder(MetadataConfig::default())
//!     .source(declared)
//!     .build();
//!
//! let company = pipeline.create("App\\Entity\\Company").unwrap();
//! assert_eq!(company.short_name(), Some("Company"));
//! assert!(company.operation("Company_get").is_ok());
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod extractor;
pub mod link;
pub mod operation;
pub mod pipeline;
pub mod resource;
pub mod source;
pub mod stages;

pub use cache::{InMemoryMetadataCache, MetadataCache, NoopMetadataCache};
pub use config::{MetadataConfig, PaginationDefaults};
pub use error::{MetadataError, MetadataResult};
pub use extractor::JsonExtractor;
pub use link::Link;
pub use operation::{IoOverride, MetadataFields, Operation, OperationKind};
pub use pipeline::{MetadataPipeline, MetadataPipelineBuilder, ResourceMetadataFactory};
pub use resource::ResourceDescriptor;
pub use source::{DeclaredResources, MetadataSource, MetadataSources};
pub use stages::MetadataStage;
