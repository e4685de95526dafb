//! Company / employee / timesheet resources used across the tests.

#![allow(dead_code)]

use std::io::Write;

use tempfile::NamedTempFile;

use trellis_metadata::{
    DeclaredResources, IoOverride, JsonExtractor, Link, MetadataConfig, MetadataPipeline,
    Operation, OperationKind, ResourceDescriptor,
};

pub const COMPANY: &str = "App\\Entity\\Company";
pub const EMPLOYEE: &str = "App\\Entity\\Employee";
pub const TIMESHEET: &str = "App\\Entity\\Timesheet";

/// Resource configuration for the three classes, as a JSON document.
pub const RESOURCES_JSON: &str = r#"{
    "resources": [
        {
            "class": "App\\Entity\\Company",
            "description": "A company",
            "security": "is_granted('ROLE_USER')"
        },
        {
            "class": "App\\Entity\\Employee",
            "operations": [
                {
                    "name": "company_employees",
                    "kind": "get_collection",
                    "uriTemplate": "/companies/{companyId}/employees",
                    "uriVariables": [
                        { "parameterName": "companyId", "fromClass": "App\\Entity\\Company", "toProperty": "company" }
                    ]
                },
                {
                    "name": "company_employee",
                    "kind": "get",
                    "uriTemplate": "/companies/{companyId}/employees/{id}",
                    "uriVariables": [
                        { "parameterName": "companyId", "fromClass": "App\\Entity\\Company", "toProperty": "company" },
                        { "parameterName": "id", "fromClass": "App\\Entity\\Employee" }
                    ]
                }
            ]
        },
        {
            "class": "App\\Entity\\Timesheet",
            "formats": ["jsonld"],
            "operations": [
                {
                    "name": "employee_timesheets",
                    "kind": "get_collection",
                    "uriTemplate": "/companies/{companyId}/employees/{employeeId}/timesheets",
                    "uriVariables": [
                        { "parameterName": "companyId", "fromClass": "App\\Entity\\Company", "toProperty": "company" },
                        { "parameterName": "employeeId", "fromClass": "App\\Entity\\Employee", "toProperty": "employee" }
                    ]
                }
            ]
        }
    ]
}"#;

/// Writes `content` to a temporary file that lives as long as the returned handle.
pub fn write_temp(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(content.as_bytes())
        .expect("Failed to write temp file");
    file
}

pub fn json_extractor() -> JsonExtractor {
    JsonExtractor::from_json(RESOURCES_JSON, "resources.json").expect("Invalid fixture")
}

/// Declared overrides layered on top of the JSON configuration.
pub fn declared_overrides() -> DeclaredResources {
    DeclaredResources::new()
        .with(
            ResourceDescriptor::new(COMPANY)
                .with_short_name("Firm")
                .with_operation(
                    Operation::new(OperationKind::Get)
                        .with_name("firm_get")
                        .with_output(IoOverride::class("App\\Dto\\FirmOutput")),
                )
                .expect("Invalid fixture"),
        )
        .expect("Invalid fixture")
}

pub fn pipeline() -> MetadataPipeline {
    MetadataPipeline::builder(MetadataConfig::default())
        .source(json_extractor())
        .build()
}

pub fn company_link() -> Link {
    Link::new()
        .with_parameter_name("companyId")
        .with_from_class(COMPANY)
        .with_to_property("company")
}
