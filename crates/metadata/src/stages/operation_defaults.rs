use std::sync::Arc;

use tracing::debug;

use super::MetadataStage;
use super::short_name::short_name_of;
use crate::config::MetadataConfig;
use crate::error::MetadataResult;
use crate::link::Link;
use crate::operation::{Operation, OperationKind};
use crate::resource::ResourceDescriptor;

/// Fills operation level defaults.
///
/// - resources declaring no operation get the default HTTP and GraphQL operations
/// - every operation inherits the unset resource fields
/// - names, URI templates and identifier links are generated when missing
/// - collection reads get the configured pagination defaults
#[derive(Debug, Clone)]
pub struct OperationDefaultsStage {
    config: Arc<MetadataConfig>,
}

impl OperationDefaultsStage {
    pub fn new(config: Arc<MetadataConfig>) -> Self {
        Self { config }
    }

    fn default_operations(&self) -> Vec<Operation> {
        OperationKind::HTTP
            .iter()
            .filter(|kind| **kind != OperationKind::Patch || !self.config.patch_formats.is_empty())
            .chain([OperationKind::Query, OperationKind::QueryCollection].iter())
            .map(|kind| Operation::new(*kind))
            .collect()
    }

    fn route_prefix(&self, operation: &Operation) -> String {
        let prefix = operation
            .fields()
            .route_prefix
            .as_deref()
            .or(self.config.route_prefix.as_deref())
            .unwrap_or("")
            .trim_matches('/');
        if prefix.is_empty() {
            String::new()
        } else {
            format!("/{}", prefix)
        }
    }

    fn fill_link(&self, link: Link, descriptor: &ResourceDescriptor) -> MetadataResult<Link> {
        let mut link = link;
        if link.to_class().is_none() {
            link = link.with_to_class(descriptor.class());
        }
        if link.from_class().is_none() && link.is_identifier_filter() {
            link = link.with_from_class(descriptor.class());
        }
        if link.identifiers().is_empty() {
            let identifiers = if link.from_class() == Some(descriptor.class()) {
                descriptor.identifiers().to_vec()
            } else {
                self.config.default_identifiers.clone()
            };
            link = link.with_identifiers(identifiers);
        }
        link.validate()?;
        Ok(link)
    }

    fn fill_operation(
        &self,
        operation: Operation,
        descriptor: &ResourceDescriptor,
        short_name: &str,
    ) -> MetadataResult<Operation> {
        let kind = operation.kind();
        let mut operation = operation.with_resource(descriptor);

        if operation.name().is_none() {
            operation = operation.with_name(format!("{}_{}", short_name, kind.default_name()));
        }

        if operation.uri_template().is_none() && !kind.is_graphql() {
            let mut template = format!("{}/{}", self.route_prefix(&operation), plural(short_name));
            if !kind.is_collection() {
                template.push_str("/{id}");
            }
            operation = operation.with_uri_template(template);
        }

        let declared = if kind.is_graphql() {
            operation.links().map(<[Link]>::to_vec)
        } else {
            operation.uri_variables().map(<[Link]>::to_vec)
        };
        let links = match declared {
            Some(links) => links
                .into_iter()
                .map(|link| self.fill_link(link, descriptor))
                .collect::<MetadataResult<Vec<_>>>()?,
            None if !kind.is_collection() => vec![self.fill_link(
                Link::identifier_filter("id", descriptor.class(), descriptor.identifiers().to_vec()),
                descriptor,
            )?],
            None => Vec::new(),
        };
        operation = if kind.is_graphql() {
            operation.with_links(links)
        } else {
            operation.with_uri_variables(links)
        };

        if matches!(kind, OperationKind::GetCollection | OperationKind::QueryCollection) {
            let pagination = &self.config.pagination;
            let mut fields = operation.fields().clone();
            fields.pagination_enabled.get_or_insert(pagination.enabled);
            fields
                .pagination_items_per_page
                .get_or_insert(pagination.items_per_page);
            fields.pagination_client_enabled.get_or_insert(pagination.client_enabled);
            if fields.pagination_maximum_items_per_page.is_none() {
                fields.pagination_maximum_items_per_page = pagination.maximum_items_per_page;
            }
            operation = operation.with_fields(fields);
        }

        Ok(operation)
    }
}

impl MetadataStage for OperationDefaultsStage {
    fn name(&self) -> &'static str {
        "operation_defaults"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn apply(&self, descriptor: ResourceDescriptor) -> MetadataResult<ResourceDescriptor> {
        let short_name = descriptor
            .short_name()
            .map(str::to_string)
            .unwrap_or_else(|| short_name_of(descriptor.class()).to_string());

        let mut descriptor = descriptor;
        if descriptor.identifiers().is_empty() {
            descriptor = descriptor.with_identifiers(self.config.default_identifiers.clone());
        }
        if descriptor.operations().is_empty() {
            debug!(class = descriptor.class(), "Generating default operations");
            descriptor = descriptor.with_operations(self.default_operations())?;
        }

        descriptor.map_operations(|operation, resource| {
            self.fill_operation(operation, resource, &short_name)
        })
    }
}

/// Pluralizes a short name for URI templates: `Company` gives `companies`.
fn plural(short_name: &str) -> String {
    let lower = short_name.to_lowercase();
    let consonant_y = lower.ends_with('y')
        && !lower
            .chars()
            .rev()
            .nth(1)
            .is_some_and(|c| "aeiou".contains(c));
    if consonant_y {
        format!("{}ies", &lower[..lower.len() - 1])
    } else if ["s", "x", "ch", "sh"].iter().any(|suffix| lower.ends_with(suffix)) {
        format!("{}es", lower)
    } else {
        format!("{}s", lower)
    }
}
