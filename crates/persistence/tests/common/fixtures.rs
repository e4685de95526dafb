//! Companies, employees, timesheets, projects and badges, mapped for both backends.

#![allow(dead_code)]

use std::io::Write;
use std::sync::Arc;

use serde_json::{Value, json};
use tempfile::NamedTempFile;

use trellis_metadata::{JsonExtractor, Link, MetadataConfig, MetadataPipeline};
use trellis_persistence::MappingRegistry;
use trellis_persistence::query::InMemoryDocumentStore;

pub const COMPANY: &str = "App\\Entity\\Company";
pub const EMPLOYEE: &str = "App\\Entity\\Employee";
pub const TIMESHEET: &str = "App\\Entity\\Timesheet";
pub const PROJECT: &str = "App\\Entity\\Project";
pub const BADGE: &str = "App\\Entity\\Badge";

/// Persistence mappings of the five classes.
pub const MAPPINGS_JSON: &str = r#"{
    "classes": [
        {
            "class": "App\\Entity\\Company",
            "table": "company",
            "identifiers": ["id"],
            "fields": [
                { "name": "id", "type": "integer" },
                { "name": "name", "type": "string" }
            ],
            "associations": [
                { "name": "employees", "kind": "one_to_many", "target": "App\\Entity\\Employee", "mappedBy": "company" }
            ]
        },
        {
            "class": "App\\Entity\\Employee",
            "table": "employee",
            "identifiers": ["id"],
            "fields": [
                { "name": "id", "type": "integer" },
                { "name": "name", "type": "string" },
                { "name": "hiredAt", "type": "date_time", "column": "hired_at", "nullable": true }
            ],
            "associations": [
                { "name": "company", "kind": "many_to_one", "target": "App\\Entity\\Company", "inversedBy": "employees" },
                { "name": "timesheets", "kind": "one_to_many", "target": "App\\Entity\\Timesheet", "mappedBy": "employee" },
                { "name": "badge", "kind": "one_to_one", "target": "App\\Entity\\Badge", "mappedBy": "employee" },
                {
                    "name": "projects", "kind": "many_to_many", "target": "App\\Entity\\Project", "inversedBy": "employees",
                    "joinTable": { "name": "employee_project", "joinColumn": "employee_id", "inverseJoinColumn": "project_id" }
                }
            ]
        },
        {
            "class": "App\\Entity\\Timesheet",
            "table": "timesheet",
            "identifiers": ["id"],
            "fields": [
                { "name": "id", "type": "integer" },
                { "name": "hours", "type": "integer" }
            ],
            "associations": [
                { "name": "employee", "kind": "many_to_one", "target": "App\\Entity\\Employee", "inversedBy": "timesheets" },
                { "name": "company", "kind": "many_to_one", "target": "App\\Entity\\Company" }
            ]
        },
        {
            "class": "App\\Entity\\Project",
            "table": "project",
            "identifiers": ["id"],
            "fields": [
                { "name": "id", "type": "integer" },
                { "name": "name", "type": "string" }
            ],
            "associations": [
                { "name": "employees", "kind": "many_to_many", "target": "App\\Entity\\Employee", "mappedBy": "projects" }
            ]
        },
        {
            "class": "App\\Entity\\Badge",
            "table": "badge",
            "identifiers": ["id"],
            "fields": [
                { "name": "id", "type": "integer" },
                { "name": "code", "type": "string" }
            ],
            "associations": [
                { "name": "employee", "kind": "one_to_one", "target": "App\\Entity\\Employee", "inversedBy": "badge" }
            ]
        }
    ]
}"#;

/// Resource metadata with nested operations.
pub const RESOURCES_JSON: &str = r#"{
    "resources": [
        { "class": "App\\Entity\\Company" },
        {
            "class": "App\\Entity\\Employee",
            "operations": [
                {
                    "name": "company_employees",
                    "kind": "get_collection",
                    "uriTemplate": "/companies/{companyId}/employees",
                    "uriVariables": [
                        { "parameterName": "companyId", "fromClass": "App\\Entity\\Company", "fromProperty": "employees" }
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
        },
        {
            "class": "App\\Entity\\Project",
            "operations": [
                {
                    "name": "project_members",
                    "kind": "get_collection",
                    "uriTemplate": "/projects/{projectId}/members",
                    "uriVariables": [
                        {
                            "parameterName": "projectId",
                            "fromClass": "App\\Entity\\Project",
                            "toClass": "App\\Entity\\Employee",
                            "fromProperty": "employees"
                        }
                    ]
                }
            ]
        },
        { "class": "App\\Entity\\Badge" }
    ]
}"#;

/// Schema and rows mirroring [`documents`].
pub const SQLITE_FIXTURES: &str = "
    CREATE TABLE company (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
    CREATE TABLE employee (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        hired_at TEXT,
        company_id INTEGER REFERENCES company(id)
    );
    CREATE TABLE timesheet (
        id INTEGER PRIMARY KEY,
        hours INTEGER NOT NULL,
        employee_id INTEGER REFERENCES employee(id),
        company_id INTEGER REFERENCES company(id)
    );
    CREATE TABLE project (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
    CREATE TABLE employee_project (
        employee_id INTEGER REFERENCES employee(id),
        project_id INTEGER REFERENCES project(id)
    );
    CREATE TABLE badge (id INTEGER PRIMARY KEY, code TEXT NOT NULL, employee_id INTEGER REFERENCES employee(id));

    INSERT INTO company VALUES (1, 'Acme'), (2, 'Initech');
    INSERT INTO employee VALUES
        (1, 'Ada', '2020-03-01 00:00:00', 1),
        (2, 'Grace', NULL, 1),
        (3, 'Linus', '2019-06-15 00:00:00', 2);
    INSERT INTO timesheet VALUES (1, 8, 1, 1), (2, 6, 2, 1), (3, 7, 2, 1), (4, 5, 3, 2);
    INSERT INTO project VALUES (1, 'Apollo'), (2, 'Gemini');
    INSERT INTO employee_project VALUES (1, 1), (2, 1), (3, 2);
    INSERT INTO badge VALUES (1, 'A-1', 1), (2, 'G-2', 2);
";

/// Writes `content` to a temporary file that lives as long as the handle.
pub fn write_temp(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(content.as_bytes()).expect("Failed to write temp file");
    file
}

pub fn mappings() -> MappingRegistry {
    MappingRegistry::from_json(MAPPINGS_JSON, "mappings.json").expect("Invalid fixture")
}

pub fn metadata() -> MetadataPipeline {
    let extractor = JsonExtractor::from_json(RESOURCES_JSON, "resources.json").expect("Invalid fixture");
    MetadataPipeline::builder(MetadataConfig::default())
        .source(extractor)
        .build()
}

pub fn handler() -> trellis_persistence::LinksHandler {
    trellis_persistence::LinksHandler::new(Arc::new(metadata()), Arc::new(mappings()))
}

/// Documents mirroring [`SQLITE_FIXTURES`]. Owning references are stored as ids.
pub fn documents() -> Vec<(&'static str, Vec<Value>)> {
    vec![
        (
            "company",
            vec![json!({"_id": 1, "name": "Acme"}), json!({"_id": 2, "name": "Initech"})],
        ),
        (
            "employee",
            vec![
                json!({"_id": 1, "name": "Ada", "hiredAt": "2020-03-01T00:00:00+00:00", "company": 1, "projects": [1]}),
                json!({"_id": 2, "name": "Grace", "hiredAt": null, "company": 1, "projects": [1]}),
                json!({"_id": 3, "name": "Linus", "hiredAt": "2019-06-15T00:00:00+00:00", "company": 2, "projects": [2]}),
            ],
        ),
        (
            "timesheet",
            vec![
                json!({"_id": 1, "hours": 8, "employee": 1, "company": 1}),
                json!({"_id": 2, "hours": 6, "employee": 2, "company": 1}),
                json!({"_id": 3, "hours": 7, "employee": 2, "company": 1}),
                json!({"_id": 4, "hours": 5, "employee": 3, "company": 2}),
            ],
        ),
        (
            "project",
            vec![json!({"_id": 1, "name": "Apollo"}), json!({"_id": 2, "name": "Gemini"})],
        ),
        (
            "badge",
            vec![
                json!({"_id": 1, "code": "A-1", "employee": 1}),
                json!({"_id": 2, "code": "G-2", "employee": 2}),
            ],
        ),
    ]
}

pub fn document_store() -> InMemoryDocumentStore {
    let store = InMemoryDocumentStore::new();
    for (collection, docs) in documents() {
        store.insert_many(collection, docs);
    }
    store
}

/// `_id` of each document, in order.
pub fn document_ids(documents: &[Value]) -> Vec<i64> {
    documents.iter().filter_map(|d| d["_id"].as_i64()).collect()
}

/// `id` column of each row, in order.
pub fn row_ids(rows: &[Value]) -> Vec<i64> {
    rows.iter().filter_map(|r| r["id"].as_i64()).collect()
}

/// A relation link whose captured value is the `id` of `from_class`.
pub fn relation(parameter: &str, from_class: &str) -> Link {
    Link::new()
        .with_parameter_name(parameter)
        .with_from_class(from_class)
        .with_identifiers(["id"])
}

/// The links of `/companies/{companyId}/employees/{employeeId}/timesheets`.
pub fn timesheet_links() -> Vec<Link> {
    vec![
        relation("companyId", COMPANY).with_to_property("company"),
        relation("employeeId", EMPLOYEE).with_to_property("employee"),
    ]
}
