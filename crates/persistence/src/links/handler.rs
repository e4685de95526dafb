//! Scoping queries from operation metadata.

use std::sync::Arc;

use tracing::debug;
use trellis_metadata::{Link, Operation, ResourceMetadataFactory};

use crate::error::{LinkError, StorageResult};
use crate::mapping::MappingRegistry;
use crate::query::{AggregationPlan, LinkQueryBuilder, QueryPlan};

use super::resolver::{IdentifierChain, LinkResolver};

/// Per-request options of link handling.
#[derive(Debug, Clone, Default)]
pub struct LinkContext {
    operation: Option<Operation>,
    operation_name: Option<String>,
    link_class: Option<String>,
}

impl LinkContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses this operation instead of looking one up.
    pub fn with_operation(mut self, operation: Operation) -> Self {
        self.operation = Some(operation);
        self
    }

    pub fn with_operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }

    /// Resolves the resource through `class` instead of its own links.
    pub fn with_link_class(mut self, class: impl Into<String>) -> Self {
        self.link_class = Some(class.into());
        self
    }

    pub fn operation_name(&self) -> Option<&str> {
        self.operation_name.as_deref()
    }

    pub fn link_class(&self) -> Option<&str> {
        self.link_class.as_deref()
    }
}

/// Builds scoped query plans for resource operations.
pub struct LinksHandler {
    metadata: Arc<dyn ResourceMetadataFactory>,
    mappings: Arc<MappingRegistry>,
}

impl LinksHandler {
    pub fn new(metadata: Arc<dyn ResourceMetadataFactory>, mappings: Arc<MappingRegistry>) -> Self {
        Self { metadata, mappings }
    }

    pub fn mappings(&self) -> &MappingRegistry {
        &self.mappings
    }

    /// A relational plan for `resource_class`, scoped by `identifiers`.
    pub fn relational_plan(
        &self,
        resource_class: &str,
        identifiers: &IdentifierChain,
        context: &LinkContext,
    ) -> StorageResult<QueryPlan> {
        let mut plan = QueryPlan::new(resource_class);
        self.handle_links(&mut plan, identifiers, context, resource_class)?;
        Ok(plan)
    }

    /// A document plan for `resource_class`, scoped by `identifiers`.
    pub fn aggregation_plan(
        &self,
        resource_class: &str,
        identifiers: &IdentifierChain,
        context: &LinkContext,
    ) -> StorageResult<AggregationPlan<'_>> {
        let mut plan = AggregationPlan::new(&self.mappings, resource_class)?;
        self.handle_links(&mut plan, identifiers, context, resource_class)?;
        Ok(plan)
    }

    /// Adds the predicates of the operation's links to `builder`.
    pub fn handle_links<B>(
        &self,
        builder: &mut B,
        identifiers: &IdentifierChain,
        context: &LinkContext,
        resource_class: &str,
    ) -> StorageResult<()>
    where
        B: LinkQueryBuilder + ?Sized,
    {
        if identifiers.is_empty() {
            return Ok(());
        }

        let operation = match &context.operation {
            Some(operation) => operation.clone(),
            None => self
                .metadata
                .operation(resource_class, context.operation_name())?,
        };
        let mut links = operation.resolution_links().to_vec();

        if let Some(link_class) = context.link_class() {
            links = self.links_through(resource_class, link_class, &links, context)?;
        }
        if links.is_empty() {
            return Ok(());
        }

        self.mappings.get(resource_class)?;
        debug!(
            class = resource_class,
            operation = operation.name().unwrap_or("<unnamed>"),
            links = links.len(),
            "Handling links"
        );
        LinkResolver::new(&self.mappings).build_link_predicates(
            builder,
            identifiers,
            &links,
            resource_class,
        )
    }

    /// Links connecting `link_class` and `resource_class`, from either side.
    fn links_through(
        &self,
        resource_class: &str,
        link_class: &str,
        links: &[Link],
        context: &LinkContext,
    ) -> StorageResult<Vec<Link>> {
        let mut connecting: Vec<Link> = links
            .iter()
            .filter(|l| l.from_class() == Some(link_class))
            .cloned()
            .collect();

        let link_operation = self
            .metadata
            .operation(link_class, context.operation_name())
            .or_else(|_| self.metadata.operation(link_class, None))?;
        connecting.extend(
            link_operation
                .resolution_links()
                .iter()
                .filter(|l| l.to_class() == Some(resource_class))
                .cloned(),
        );

        if connecting.is_empty() {
            return Err(LinkError::CannotBeRetrieved {
                resource_class: resource_class.to_string(),
                link_class: link_class.to_string(),
            }
            .into());
        }
        Ok(connecting)
    }
}

impl std::fmt::Debug for LinksHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinksHandler")
            .field("mappings", &self.mappings.classes())
            .finish()
    }
}
