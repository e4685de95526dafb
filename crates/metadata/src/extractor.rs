//! JSON resource configuration files.
//!
//! Files are read eagerly when the extractor is built so malformed configuration fails at
//! boot. The format mirrors the in-code model with camelCase keys:
//!
//! ```json
//! {
//!   "resources": [
//!     {
//!       "class": "App\\Entity\\Employee",
//!       "identifiers": ["id"],
//!       "operations": [
//!         {
//!           "kind": "get_collection",
//!           "uriTemplate": "/companies/{companyId}/employees",
//!           "uriVariables": [
//!             { "parameterName": "companyId", "fromClass": "App\\Entity\\Company", "toProperty": "company" }
//!           ]
//!         }
//!       ]
//!     }
//!   ]
//! }
//! ```
//!
//! `input` and `output` accept a class name or `false`.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::info;

use crate::error::{MetadataError, MetadataResult};
use crate::link::Link;
use crate::operation::{IoOverride, MetadataFields, Operation, OperationKind};
use crate::resource::ResourceDescriptor;
use crate::source::MetadataSource;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFile {
    #[serde(default)]
    resources: Vec<RawResource>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawIo {
    Enabled(bool),
    Class(String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawLink {
    parameter_name: String,
    from_class: Option<String>,
    to_class: Option<String>,
    from_property: Option<String>,
    to_property: Option<String>,
    #[serde(default)]
    identifiers: Vec<String>,
    expanded_value: Option<String>,
}

/// Declares a raw config struct carrying the shared metadata keys plus its own.
///
/// `deny_unknown_fields` cannot be combined with `#[serde(flatten)]`, hence the macro.
macro_rules! raw_with_fields {
    ($name:ident { $($field:ident : $ty:ty),* $(,)? }) => {
        #[derive(Debug, Deserialize)]
        #[serde(rename_all = "camelCase", deny_unknown_fields)]
        struct $name {
            $($field: $ty,)*
            short_name: Option<String>,
            description: Option<String>,
            route_prefix: Option<String>,
            security: Option<String>,
            security_message: Option<String>,
            input: Option<RawIo>,
            output: Option<RawIo>,
            formats: Option<Vec<String>>,
            input_formats: Option<Vec<String>>,
            output_formats: Option<Vec<String>>,
            pagination_enabled: Option<bool>,
            pagination_items_per_page: Option<u32>,
            pagination_maximum_items_per_page: Option<u32>,
            pagination_client_enabled: Option<bool>,
            normalization_groups: Option<Vec<String>>,
            denormalization_groups: Option<Vec<String>>,
            stateless: Option<bool>,
        }

        impl $name {
            fn fields(&self, origin: &str) -> MetadataResult<MetadataFields> {
                Ok(MetadataFields {
                    short_name: self.short_name.clone(),
                    description: self.description.clone(),
                    route_prefix: self.route_prefix.clone(),
                    security: self.security.clone(),
                    security_message: self.security_message.clone(),
                    input: convert_io(self.input.as_ref(), "input", origin)?,
                    output: convert_io(self.output.as_ref(), "output", origin)?,
                    formats: self.formats.clone(),
                    input_formats: self.input_formats.clone(),
                    output_formats: self.output_formats.clone(),
                    pagination_enabled: self.pagination_enabled,
                    pagination_items_per_page: self.pagination_items_per_page,
                    pagination_maximum_items_per_page: self.pagination_maximum_items_per_page,
                    pagination_client_enabled: self.pagination_client_enabled,
                    normalization_groups: self.normalization_groups.clone(),
                    denormalization_groups: self.denormalization_groups.clone(),
                    stateless: self.stateless,
                })
            }
        }
    };
}

raw_with_fields!(RawResource {
    class: String,
    parent: Option<String>,
    identifiers: Option<Vec<String>>,
    operations: Option<Vec<RawOperation>>,
});

raw_with_fields!(RawOperation {
    name: Option<String>,
    kind: String,
    uri_template: Option<String>,
    uri_variables: Option<Vec<RawLink>>,
    links: Option<Vec<RawLink>>,
});

fn convert_io(raw: Option<&RawIo>, key: &str, origin: &str) -> MetadataResult<Option<IoOverride>> {
    match raw {
        None => Ok(None),
        Some(RawIo::Enabled(false)) => Ok(Some(IoOverride::Disabled)),
        Some(RawIo::Enabled(true)) => Err(MetadataError::invalid(format!(
            "{}: \"{}\" must be a class name or false",
            origin, key
        ))),
        Some(RawIo::Class(class)) => Ok(Some(IoOverride::class(class.clone()))),
    }
}

fn convert_link(raw: &RawLink, origin: &str) -> MetadataResult<Link> {
    let mut link = Link::new()
        .with_parameter_name(raw.parameter_name.clone())
        .with_identifiers(raw.identifiers.iter().cloned());
    if let Some(class) = &raw.from_class {
        link = link.with_from_class(class.clone());
    }
    if let Some(class) = &raw.to_class {
        link = link.with_to_class(class.clone());
    }
    if let Some(property) = &raw.from_property {
        link = link.with_from_property(property.clone());
    }
    if let Some(property) = &raw.to_property {
        link = link.with_to_property(property.clone());
    }
    if let Some(value) = &raw.expanded_value {
        link = link.with_expanded_value(value.clone());
    }

    // Identifiers may still be filled by the defaults stage; everything else is final.
    if raw.from_property.is_some() && raw.to_property.is_some() {
        return Err(MetadataError::invalid(format!(
            "{}: link \"{}\" cannot declare both fromProperty and toProperty",
            origin, raw.parameter_name
        )));
    }
    if !link.is_identifier_filter() && link.from_class().is_none() {
        return Err(MetadataError::invalid(format!(
            "{}: link \"{}\" declares a relation property without fromClass",
            origin, raw.parameter_name
        )));
    }
    Ok(link)
}

fn convert_operation(raw: &RawOperation, origin: &str) -> MetadataResult<Operation> {
    let kind: OperationKind = raw
        .kind
        .parse()
        .map_err(|e: String| MetadataError::invalid(format!("{}: {}", origin, e)))?;

    let mut operation = Operation::new(kind).with_fields(raw.fields(origin)?);
    if let Some(name) = &raw.name {
        operation = operation.with_name(name.clone());
    }
    if let Some(template) = &raw.uri_template {
        operation = operation.with_uri_template(template.clone());
    }
    if let Some(links) = &raw.uri_variables {
        let links = links
            .iter()
            .map(|l| convert_link(l, origin))
            .collect::<MetadataResult<Vec<_>>>()?;
        operation = operation.with_uri_variables(links);
    }
    if let Some(links) = &raw.links {
        let links = links
            .iter()
            .map(|l| convert_link(l, origin))
            .collect::<MetadataResult<Vec<_>>>()?;
        operation = operation.with_links(links);
    }
    Ok(operation)
}

fn convert_resource(raw: &RawResource, origin: &str) -> MetadataResult<ResourceDescriptor> {
    if raw.class.trim().is_empty() {
        return Err(MetadataError::invalid(format!(
            "{}: resource class cannot be empty",
            origin
        )));
    }

    let mut descriptor = ResourceDescriptor::new(raw.class.clone()).with_fields(raw.fields(origin)?);
    if let Some(parent) = &raw.parent {
        descriptor = descriptor.with_parent(parent.clone());
    }
    if let Some(identifiers) = &raw.identifiers {
        descriptor = descriptor.with_identifiers(identifiers.iter().cloned());
    }
    for operation in raw.operations.iter().flatten() {
        descriptor = descriptor.with_operation(convert_operation(operation, origin)?)?;
    }
    Ok(descriptor)
}

/// Metadata source backed by JSON configuration files.
#[derive(Debug, Default, Clone)]
pub struct JsonExtractor {
    paths: Vec<PathBuf>,
    resources: Vec<ResourceDescriptor>,
}

impl JsonExtractor {
    /// Reads and validates every file.
    pub fn from_paths<P: AsRef<Path>>(paths: &[P]) -> MetadataResult<Self> {
        let mut extractor = Self::default();
        for path in paths {
            let path = path.as_ref();
            let content =
                std::fs::read_to_string(path).map_err(|e| MetadataError::ConfigLoadFailed {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })?;
            extractor.add_document(&content, &path.display().to_string())?;
            extractor.paths.push(path.to_path_buf());
        }
        Ok(extractor)
    }

    /// Parses one JSON document. `origin` names it in error messages.
    pub fn from_json(content: &str, origin: &str) -> MetadataResult<Self> {
        let mut extractor = Self::default();
        extractor.add_document(content, origin)?;
        Ok(extractor)
    }

    fn add_document(&mut self, content: &str, origin: &str) -> MetadataResult<()> {
        let raw: RawFile =
            serde_json::from_str(content).map_err(|e| MetadataError::ConfigLoadFailed {
                path: origin.to_string(),
                message: format!("Invalid JSON: {}", e),
            })?;

        for resource in &raw.resources {
            let descriptor = convert_resource(resource, origin)?;
            if self.resources.iter().any(|r| r.class() == descriptor.class()) {
                return Err(MetadataError::invalid(format!(
                    "{}: resource class \"{}\" is configured twice",
                    origin,
                    descriptor.class()
                )));
            }
            self.resources.push(descriptor);
        }

        info!(origin, resources = raw.resources.len(), "Loaded resource configuration");
        Ok(())
    }

    /// Files this extractor was built from.
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl MetadataSource for JsonExtractor {
    fn name(&self) -> &str {
        "json"
    }

    fn resource_classes(&self) -> Vec<String> {
        self.resources.iter().map(|r| r.class().to_string()).collect()
    }

    fn load(&self, class: &str) -> MetadataResult<Option<ResourceDescriptor>> {
        Ok(self.resources.iter().find(|r| r.class() == class).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMPANY: &str = r#"{
        "resources": [
            {
                "class": "App\\Entity\\Company",
                "shortName": "Company",
                "input": false,
                "output": "App\\Dto\\CompanyOutput",
                "operations": [
                    { "name": "company_get", "kind": "get", "uriTemplate": "/companies/{id}" },
                    {
                        "kind": "get_collection",
                        "uriTemplate": "/companies/{companyId}/employees",
                        "uriVariables": [
                            {
                                "parameterName": "companyId",
                                "fromClass": "App\\Entity\\Company",
                                "fromProperty": "employees",
                                "identifiers": ["id"]
                            }
                        ]
                    }
                ]
            }
        ]
    }"#;

    #[test]
    fn test_parse_document() {
        let extractor = JsonExtractor::from_json(COMPANY, "company.json").unwrap();
        assert_eq!(extractor.resource_classes(), vec!["App\\Entity\\Company"]);

        let company = extractor.load("App\\Entity\\Company").unwrap().unwrap();
        assert_eq!(company.short_name(), Some("Company"));
        assert_eq!(company.fields().input, Some(IoOverride::Disabled));
        assert_eq!(
            company.fields().output,
            Some(IoOverride::class("App\\Dto\\CompanyOutput"))
        );
        assert_eq!(company.operations().len(), 2);

        let collection = &company.operations()[1];
        assert_eq!(collection.kind(), OperationKind::GetCollection);
        let links = collection.uri_variables().unwrap();
        assert_eq!(links[0].from_property(), Some("employees"));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = JsonExtractor::from_json(
            r#"{"resources": [{"class": "A", "shortname": "A"}]}"#,
            "bad.json",
        )
        .unwrap_err();
        assert!(matches!(err, MetadataError::ConfigLoadFailed { .. }));
    }

    #[test]
    fn test_invalid_link_rejected() {
        let err = JsonExtractor::from_json(
            r#"{"resources": [{"class": "A", "operations": [{"kind": "get", "uriVariables": [
                {"parameterName": "bId", "fromClass": "B", "fromProperty": "as", "toProperty": "b"}
            ]}]}]}"#,
            "bad.json",
        )
        .unwrap_err();
        assert!(err.to_string().contains("both fromProperty and toProperty"));
    }

    #[test]
    fn test_input_true_rejected() {
        let err =
            JsonExtractor::from_json(r#"{"resources": [{"class": "A", "input": true}]}"#, "x.json")
                .unwrap_err();
        assert!(matches!(err, MetadataError::InvalidArgument { .. }));
    }

    #[test]
    fn test_duplicate_class_rejected() {
        let err = JsonExtractor::from_json(
            r#"{"resources": [{"class": "A"}, {"class": "A"}]}"#,
            "dup.json",
        )
        .unwrap_err();
        assert!(err.to_string().contains("configured twice"));
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let err = JsonExtractor::from_json(
            r#"{"resources": [{"class": "A", "operations": [{"kind": "head"}]}]}"#,
            "kind.json",
        )
        .unwrap_err();
        assert!(err.to_string().contains("unknown operation kind"));
    }
}
