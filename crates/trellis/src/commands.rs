//! Subcommand implementations. Each returns the text printed on stdout.

use std::sync::Arc;

use anyhow::Context;
use serde_json::{Map, Value, json};
use tracing::info;
use trellis_metadata::{JsonExtractor, MetadataConfig, MetadataPipeline, ResourceMetadataFactory};
use trellis_persistence::query::Binding;
use trellis_persistence::{IdentifierChain, LinkContext, LinksHandler, MappingRegistry};

use crate::config::{Backend, CliConfig, Command, PlanArgs};

pub fn run(config: &CliConfig) -> anyhow::Result<String> {
    let metadata = load_metadata(config)?;
    match &config.command {
        Command::Resources => Ok(list_resources(&metadata)),
        Command::Describe { class } => describe(&metadata, class),
        Command::Plan(args) => {
            let mappings = MappingRegistry::load(config.mappings.as_slice())
                .context("Failed to load persistence mappings")?;
            info!(classes = mappings.len(), "Loaded persistence mappings");
            plan(LinksHandler::new(Arc::new(metadata), Arc::new(mappings)), args)
        }
    }
}

fn load_metadata(config: &CliConfig) -> anyhow::Result<MetadataPipeline> {
    let metadata_config = match &config.metadata_config {
        Some(path) => MetadataConfig::load(path)?,
        None => MetadataConfig::default(),
    };
    let extractor = JsonExtractor::from_paths(config.resources.as_slice())
        .context("Failed to load resource configuration")?;
    info!(resources = extractor.len(), "Loaded resource configuration");
    Ok(MetadataPipeline::builder(metadata_config)
        .source(extractor)
        .build())
}

fn list_resources(metadata: &MetadataPipeline) -> String {
    let mut classes = metadata.resource_classes();
    classes.sort();
    classes.join("\n")
}

fn describe(metadata: &MetadataPipeline, class: &str) -> anyhow::Result<String> {
    let descriptor = metadata.create(class)?;
    Ok(serde_json::to_string_pretty(descriptor.as_ref())?)
}

fn plan(handler: LinksHandler, args: &PlanArgs) -> anyhow::Result<String> {
    let identifiers: IdentifierChain = args.identifiers.iter().cloned().collect();
    let mut context = LinkContext::new();
    if let Some(operation) = &args.operation {
        context = context.with_operation_name(operation);
    }
    if let Some(link_class) = &args.link_class {
        context = context.with_link_class(link_class);
    }

    let output = match args.backend {
        Backend::Relational => {
            let plan = handler.relational_plan(&args.class, &identifiers, &context)?;
            let sql = plan.to_sql(handler.mappings())?;
            let mut output = json!({
                "dql": plan.to_dql(),
                "parameters": parameters(plan.parameters()),
                "sql": sql.sql,
                "sqlParams": sql.params,
            });
            if let Some(database) = &args.execute {
                output["rows"] = Value::Array(execute(database, &sql)?);
            }
            output
        }
        Backend::Document => {
            let plan = handler.aggregation_plan(&args.class, &identifiers, &context)?;
            let mut output = plan.to_json();
            output["parameters"] = parameters(plan.parameters());
            output
        }
    };
    Ok(serde_json::to_string_pretty(&output)?)
}

fn parameters(bindings: &[Binding]) -> Value {
    let mut map = Map::new();
    for binding in bindings {
        map.insert(binding.name.clone(), binding.value.to_json());
    }
    Value::Object(map)
}

#[cfg(feature = "sqlite")]
fn execute(
    database: &std::path::Path,
    sql: &trellis_persistence::query::SqlFragment,
) -> anyhow::Result<Vec<Value>> {
    use trellis_persistence::backends::sqlite::SqliteExecutor;

    info!(database = %database.display(), "Executing plan on SQLite");
    let executor = SqliteExecutor::open(database)?;
    Ok(executor.query(sql)?)
}

#[cfg(not(feature = "sqlite"))]
fn execute(
    _database: &std::path::Path,
    _sql: &trellis_persistence::query::SqlFragment,
) -> anyhow::Result<Vec<Value>> {
    anyhow::bail!(
        "Executing plans requires the 'sqlite' feature. \
         Build with: cargo build -p trellis --features sqlite"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use clap::Parser;
    use tempfile::NamedTempFile;

    const RESOURCES: &str = r#"{
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
                            { "parameterName": "companyId", "fromClass": "App\\Entity\\Company", "toProperty": "company" }
                        ]
                    }
                ]
            }
        ]
    }"#;

    const MAPPINGS: &str = r#"{
        "classes": [
            {
                "class": "App\\Entity\\Company",
                "table": "company",
                "identifiers": ["id"],
                "fields": [{ "name": "id", "type": "integer" }]
            },
            {
                "class": "App\\Entity\\Employee",
                "table": "employee",
                "identifiers": ["id"],
                "fields": [
                    { "name": "id", "type": "integer" },
                    { "name": "name", "type": "string" }
                ],
                "associations": [
                    { "name": "company", "kind": "many_to_one", "target": "App\\Entity\\Company" }
                ]
            }
        ]
    }"#;

    fn write_temp(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(content.as_bytes())
            .expect("Failed to write temp file");
        file
    }

    struct Fixture {
        resources: NamedTempFile,
        mappings: NamedTempFile,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                resources: write_temp(RESOURCES),
                mappings: write_temp(MAPPINGS),
            }
        }

        fn run(&self, args: &[&str]) -> anyhow::Result<String> {
            let mut argv = vec![
                "trellis",
                "--resources",
                self.resources.path().to_str().unwrap(),
                "--mappings",
                self.mappings.path().to_str().unwrap(),
            ];
            argv.extend_from_slice(args);
            run(&CliConfig::try_parse_from(argv).unwrap())
        }
    }

    #[test]
    fn test_resources_lists_classes() {
        let output = Fixture::new().run(&["resources"]).unwrap();
        assert_eq!(output, "App\\Entity\\Company\nApp\\Entity\\Employee");
    }

    #[test]
    fn test_describe_prints_resolved_operations() {
        let output = Fixture::new()
            .run(&["describe", "App\\Entity\\Company"])
            .unwrap();
        let descriptor: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(descriptor["class"], "App\\Entity\\Company");
        assert!(output.contains("Company_get_collection"));
    }

    #[test]
    fn test_describe_unknown_class_fails() {
        assert!(Fixture::new().run(&["describe", "App\\Entity\\Nope"]).is_err());
    }

    #[test]
    fn test_relational_plan() {
        let output = Fixture::new()
            .run(&[
                "plan",
                "App\\Entity\\Employee",
                "--operation",
                "company_employees",
                "--id",
                "companyId=7",
            ])
            .unwrap();
        let plan: Value = serde_json::from_str(&output).unwrap();

        assert_eq!(
            plan["dql"],
            "SELECT o FROM App\\Entity\\Employee o INNER JOIN o.company company_a1 \
             WHERE company_a1.id = :id_p2"
        );
        assert_eq!(
            plan["sql"],
            "SELECT o.* FROM employee o INNER JOIN company company_a1 \
             ON company_a1.id = o.company_id WHERE company_a1.id = ?1"
        );
        assert_eq!(plan["parameters"], json!({ "id_p2": 7 }));
        assert_eq!(plan["sqlParams"], json!([7]));
    }

    #[test]
    fn test_document_plan() {
        let output = Fixture::new()
            .run(&[
                "plan",
                "App\\Entity\\Employee",
                "--id",
                "companyId=7",
                "--backend",
                "document",
            ])
            .unwrap();
        let plan: Value = serde_json::from_str(&output).unwrap();

        assert_eq!(plan["nodes"][0]["collection"], "employee");
        assert_eq!(plan["nodes"][1]["collection"], "company");
        assert_eq!(plan["nodes"][1]["stages"], json!([{ "$match": { "_id": 7 } }]));
    }

    #[test]
    fn test_invalid_identifier_fails() {
        let err = Fixture::new()
            .run(&["plan", "App\\Entity\\Employee", "--id", "companyId=acme"])
            .unwrap_err();
        assert!(err.to_string().contains("companyId"));
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn test_plan_executes_on_sqlite() {
        use trellis_persistence::backends::sqlite::SqliteExecutor;

        let database = tempfile::Builder::new().suffix(".db").tempfile().unwrap();
        SqliteExecutor::open(database.path())
            .unwrap()
            .execute_batch(
                "CREATE TABLE company (id INTEGER PRIMARY KEY);
                 CREATE TABLE employee (id INTEGER PRIMARY KEY, name TEXT, company_id INTEGER);
                 INSERT INTO company VALUES (1), (2);
                 INSERT INTO employee VALUES (1, 'Ada', 1), (2, 'Linus', 2);",
            )
            .unwrap();

        let output = Fixture::new()
            .run(&[
                "plan",
                "App\\Entity\\Employee",
                "--id",
                "companyId=2",
                "--execute",
                database.path().to_str().unwrap(),
            ])
            .unwrap();
        let plan: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(plan["rows"], json!([{ "id": 2, "name": "Linus", "company_id": 2 }]));
    }
}
