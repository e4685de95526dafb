//! Operation metadata.
//!
//! An [`Operation`] describes one exposed endpoint. Operations are immutable: every
//! `with_*` method consumes the value and returns the updated one, so a descriptor that
//! has been shared (for example through the metadata cache) can never change under a
//! reader.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::link::Link;
use crate::resource::ResourceDescriptor;

/// The kind of an operation: an HTTP method or a GraphQL operation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// `GET` on a single item.
    Get,
    /// `GET` on a collection.
    GetCollection,
    /// `POST` to a collection.
    Post,
    /// `PUT` on an item.
    Put,
    /// `PATCH` on an item.
    Patch,
    /// `DELETE` on an item.
    Delete,
    /// GraphQL item query.
    Query,
    /// GraphQL collection query.
    QueryCollection,
    /// GraphQL mutation.
    Mutation,
    /// GraphQL subscription.
    Subscription,
}

impl OperationKind {
    /// All HTTP kinds, in the order default operations are generated.
    pub const HTTP: [OperationKind; 6] = [
        OperationKind::Get,
        OperationKind::GetCollection,
        OperationKind::Post,
        OperationKind::Put,
        OperationKind::Patch,
        OperationKind::Delete,
    ];

    /// HTTP method, or `None` for GraphQL operations.
    pub fn method(&self) -> Option<&'static str> {
        match self {
            OperationKind::Get | OperationKind::GetCollection => Some("GET"),
            OperationKind::Post => Some("POST"),
            OperationKind::Put => Some("PUT"),
            OperationKind::Patch => Some("PATCH"),
            OperationKind::Delete => Some("DELETE"),
            _ => None,
        }
    }

    /// Returns true for operations acting on a collection rather than an item.
    pub fn is_collection(&self) -> bool {
        matches!(
            self,
            OperationKind::GetCollection | OperationKind::Post | OperationKind::QueryCollection
        )
    }

    /// Returns true for GraphQL operations.
    pub fn is_graphql(&self) -> bool {
        matches!(
            self,
            OperationKind::Query
                | OperationKind::QueryCollection
                | OperationKind::Mutation
                | OperationKind::Subscription
        )
    }

    /// Suffix used when an operation name has to be generated.
    pub fn default_name(&self) -> &'static str {
        match self {
            OperationKind::Get => "get",
            OperationKind::GetCollection => "get_collection",
            OperationKind::Post => "post",
            OperationKind::Put => "put",
            OperationKind::Patch => "patch",
            OperationKind::Delete => "delete",
            OperationKind::Query => "item_query",
            OperationKind::QueryCollection => "collection_query",
            OperationKind::Mutation => "mutation",
            OperationKind::Subscription => "subscription",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.default_name())
    }
}

impl FromStr for OperationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "get" => Ok(OperationKind::Get),
            "get_collection" => Ok(OperationKind::GetCollection),
            "post" => Ok(OperationKind::Post),
            "put" => Ok(OperationKind::Put),
            "patch" => Ok(OperationKind::Patch),
            "delete" => Ok(OperationKind::Delete),
            "query" | "item_query" => Ok(OperationKind::Query),
            "query_collection" | "collection_query" => Ok(OperationKind::QueryCollection),
            "mutation" => Ok(OperationKind::Mutation),
            "subscription" => Ok(OperationKind::Subscription),
            _ => Err(format!("unknown operation kind: {}", s)),
        }
    }
}

/// Input or output class override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum IoOverride {
    /// The operation takes no input (or produces no output).
    Disabled,
    /// The operation reads or writes another class.
    Class {
        class: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
}

impl IoOverride {
    /// Creates a class override with no name yet.
    pub fn class(class: impl Into<String>) -> Self {
        IoOverride::Class {
            class: class.into(),
            name: None,
        }
    }
}

/// Nullable metadata shared by resources and operations.
///
/// On a resource these fields are defaults; on an operation they are the effective
/// values. `None` means "not configured here".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<IoOverride>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<IoOverride>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formats: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_formats: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_formats: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination_items_per_page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination_maximum_items_per_page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination_client_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalization_groups: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub denormalization_groups: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stateless: Option<bool>,
}

/// Fills every listed field of `$target` that is `None` with the value from `$source`.
macro_rules! inherit_fields {
    ($target:ident, $source:ident, [$($field:ident),* $(,)?]) => {
        $(
            if $target.$field.is_none() && $source.$field.is_some() {
                $target.$field = $source.$field.clone();
            }
        )*
    };
}

impl MetadataFields {
    /// Returns a copy of `self` where every unset field is taken from `source`.
    ///
    /// Fields already set on `self` are never overwritten.
    pub fn copy_from(&self, source: &MetadataFields) -> MetadataFields {
        let mut merged = self.clone();
        inherit_fields!(
            merged,
            source,
            [
                short_name,
                description,
                route_prefix,
                security,
                security_message,
                input,
                output,
                formats,
                input_formats,
                output_formats,
                pagination_enabled,
                pagination_items_per_page,
                pagination_maximum_items_per_page,
                pagination_client_enabled,
                normalization_groups,
                denormalization_groups,
                stateless,
            ]
        );
        merged
    }
}

/// One exposed endpoint of a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    kind: OperationKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    uri_template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    uri_variables: Option<Vec<Link>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    links: Option<Vec<Link>>,
    #[serde(flatten)]
    fields: MetadataFields,
}

impl Operation {
    /// Creates an operation of the given kind with nothing else configured.
    pub fn new(kind: OperationKind) -> Self {
        Self {
            name: None,
            kind,
            class: None,
            uri_template: None,
            uri_variables: None,
            links: None,
            fields: MetadataFields::default(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn class(&self) -> Option<&str> {
        self.class.as_deref()
    }

    pub fn uri_template(&self) -> Option<&str> {
        self.uri_template.as_deref()
    }

    pub fn uri_variables(&self) -> Option<&[Link]> {
        self.uri_variables.as_deref()
    }

    /// GraphQL links.
    pub fn links(&self) -> Option<&[Link]> {
        self.links.as_deref()
    }

    pub fn fields(&self) -> &MetadataFields {
        &self.fields
    }

    pub fn short_name(&self) -> Option<&str> {
        self.fields.short_name.as_deref()
    }

    pub fn security(&self) -> Option<&str> {
        self.fields.security.as_deref()
    }

    pub fn input(&self) -> Option<&IoOverride> {
        self.fields.input.as_ref()
    }

    pub fn output(&self) -> Option<&IoOverride> {
        self.fields.output.as_ref()
    }

    /// Whether pagination applies; `false` until defaults have been resolved.
    pub fn is_pagination_enabled(&self) -> bool {
        self.fields.pagination_enabled.unwrap_or(false)
    }

    /// The links used to scope a query: GraphQL links for GraphQL operations, URI
    /// variables otherwise.
    pub fn resolution_links(&self) -> &[Link] {
        let links = if self.kind.is_graphql() {
            self.links.as_deref()
        } else {
            self.uri_variables.as_deref()
        };
        links.unwrap_or(&[])
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.class = Some(class.into());
        self
    }

    pub fn with_uri_template(mut self, template: impl Into<String>) -> Self {
        self.uri_template = Some(template.into());
        self
    }

    pub fn with_uri_variables(mut self, links: Vec<Link>) -> Self {
        self.uri_variables = Some(links);
        self
    }

    pub fn with_links(mut self, links: Vec<Link>) -> Self {
        self.links = Some(links);
        self
    }

    pub fn with_fields(mut self, fields: MetadataFields) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_short_name(mut self, short_name: impl Into<String>) -> Self {
        self.fields.short_name = Some(short_name.into());
        self
    }

    pub fn with_security(mut self, security: impl Into<String>) -> Self {
        self.fields.security = Some(security.into());
        self
    }

    pub fn with_input(mut self, input: IoOverride) -> Self {
        self.fields.input = Some(input);
        self
    }

    pub fn with_output(mut self, output: IoOverride) -> Self {
        self.fields.output = Some(output);
        self
    }

    pub fn with_formats<I, S>(mut self, formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields.formats = Some(formats.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_pagination_enabled(mut self, enabled: bool) -> Self {
        self.fields.pagination_enabled = Some(enabled);
        self
    }

    pub fn with_pagination_items_per_page(mut self, items: u32) -> Self {
        self.fields.pagination_items_per_page = Some(items);
        self
    }

    pub fn with_normalization_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields.normalization_groups = Some(groups.into_iter().map(Into::into).collect());
        self
    }

    /// Fills the unset fields of this operation from `source`.
    pub fn copy_from(mut self, source: &MetadataFields) -> Self {
        self.fields = self.fields.copy_from(source);
        self
    }

    /// Applies the resource defaults to this operation without overriding anything
    /// the operation declares itself.
    pub fn with_resource(self, resource: &ResourceDescriptor) -> Self {
        let mut operation = self.copy_from(resource.fields());
        if operation.class.is_none() {
            operation.class = Some(resource.class().to_string());
        }
        operation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_from_fills_only_unset_fields() {
        let target = MetadataFields {
            security: Some("is_granted('ROLE_ADMIN')".to_string()),
            ..Default::default()
        };
        let source = MetadataFields {
            security: Some("is_granted('ROLE_USER')".to_string()),
            description: Some("A company".to_string()),
            pagination_items_per_page: Some(10),
            ..Default::default()
        };

        let merged = target.copy_from(&source);
        assert_eq!(merged.security.as_deref(), Some("is_granted('ROLE_ADMIN')"));
        assert_eq!(merged.description.as_deref(), Some("A company"));
        assert_eq!(merged.pagination_items_per_page, Some(10));
        assert_eq!(merged.short_name, None);
    }

    #[test]
    fn test_copy_from_is_idempotent() {
        let source = MetadataFields {
            formats: Some(vec!["jsonld".to_string()]),
            stateless: Some(true),
            ..Default::default()
        };
        let once = MetadataFields::default().copy_from(&source);
        let twice = once.copy_from(&source);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_resolution_links_by_kind() {
        let uri_variables = vec![Link::identifier_filter("id", "Company", ["id"])];
        let graphql_links = vec![Link::identifier_filter("companyId", "Company", ["id"])];

        let http = Operation::new(OperationKind::Get)
            .with_uri_variables(uri_variables.clone())
            .with_links(graphql_links.clone());
        assert_eq!(http.resolution_links(), uri_variables.as_slice());

        let graphql = Operation::new(OperationKind::Query)
            .with_uri_variables(uri_variables)
            .with_links(graphql_links.clone());
        assert_eq!(graphql.resolution_links(), graphql_links.as_slice());

        assert!(Operation::new(OperationKind::GetCollection)
            .resolution_links()
            .is_empty());
    }

    #[test]
    fn test_operation_kind_parsing() {
        assert_eq!("get".parse::<OperationKind>(), Ok(OperationKind::Get));
        assert_eq!(
            "collection_query".parse::<OperationKind>(),
            Ok(OperationKind::QueryCollection)
        );
        assert!("head".parse::<OperationKind>().is_err());
        assert_eq!(OperationKind::Patch.method(), Some("PATCH"));
        assert_eq!(OperationKind::Mutation.method(), None);
        assert!(OperationKind::Post.is_collection());
    }
}
