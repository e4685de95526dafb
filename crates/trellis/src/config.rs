//! Command line configuration.
//!
//! Every global option can also be set through the environment.
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `TRELLIS_RESOURCES` | - | Resource configuration files (comma-separated) |
//! | `TRELLIS_MAPPINGS` | - | Persistence mapping files (comma-separated) |
//! | `TRELLIS_METADATA_CONFIG` | - | Metadata configuration file |
//! | `TRELLIS_LOG_LEVEL` | warn | Log level |

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

#[derive(Debug, Clone, Parser)]
#[command(name = "trellis")]
#[command(about = "Resolves resource metadata and plans link-scoped queries")]
#[command(version)]
pub struct CliConfig {
    /// Resource configuration files.
    #[arg(long, env = "TRELLIS_RESOURCES", value_delimiter = ',', global = true)]
    pub resources: Vec<PathBuf>,

    /// Persistence mapping files, required to plan queries.
    #[arg(long, env = "TRELLIS_MAPPINGS", value_delimiter = ',', global = true)]
    pub mappings: Vec<PathBuf>,

    /// Metadata configuration file (formats, pagination, default identifiers).
    #[arg(long, env = "TRELLIS_METADATA_CONFIG", global = true)]
    pub metadata_config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "TRELLIS_LOG_LEVEL", default_value = "warn", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Lists the configured resource classes.
    Resources,

    /// Prints the resolved metadata of a resource class as JSON.
    Describe {
        /// Resource class.
        class: String,
    },

    /// Prints the query plan scoping a resource class to captured identifiers.
    Plan(PlanArgs),
}

#[derive(Debug, Clone, Args)]
pub struct PlanArgs {
    /// Resource class to fetch.
    pub class: String,

    /// Operation whose links are resolved, the first declared one by default.
    #[arg(long)]
    pub operation: Option<String>,

    /// A captured identifier, in URI order. Repeat for nested resources.
    #[arg(long = "id", value_name = "NAME=VALUE", value_parser = parse_identifier)]
    pub identifiers: Vec<(String, String)>,

    /// Resolve the resource through this class instead of its own links.
    #[arg(long)]
    pub link_class: Option<String>,

    /// Query backend to plan for.
    #[arg(long, value_enum, default_value_t = Backend::Relational)]
    pub backend: Backend,

    /// Runs the relational plan against this SQLite database and prints the rows.
    #[arg(long, value_name = "DATABASE")]
    pub execute: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    Relational,
    Document,
}

fn parse_identifier(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected NAME=VALUE, got '{}'", raw)),
    }
}

impl CliConfig {
    /// Validates the configuration and returns every error found.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.resources.is_empty() {
            errors.push("At least one resource configuration file is required".to_string());
        }
        for path in &self.resources {
            if !path.is_file() {
                errors.push(format!("Resource configuration not found: {}", path.display()));
            }
        }

        if let Command::Plan(args) = &self.command {
            if self.mappings.is_empty() {
                errors.push("Planning a query requires at least one mapping file".to_string());
            }
            if args.execute.is_some() && args.backend != Backend::Relational {
                errors.push("Only relational plans can be executed".to_string());
            }
        }
        for path in &self.mappings {
            if !path.is_file() {
                errors.push(format!("Mapping file not found: {}", path.display()));
            }
        }

        if let Some(path) = &self.metadata_config {
            if !path.is_file() {
                errors.push(format!("Metadata configuration not found: {}", path.display()));
            }
        }

        if !LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            errors.push(format!(
                "Invalid log level '{}', expected one of {}",
                self.log_level,
                LOG_LEVELS.join(", ")
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use tempfile::NamedTempFile;

    fn temp_file() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"{}").unwrap();
        file
    }

    fn parse(args: &[&str]) -> CliConfig {
        CliConfig::try_parse_from(std::iter::once("trellis").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_parse_plan_arguments() {
        let config = parse(&[
            "plan",
            "App\\Entity\\Timesheet",
            "--operation",
            "employee_timesheets",
            "--id",
            "companyId=1",
            "--id",
            "employeeId=2",
            "--backend",
            "document",
            "--resources",
            "a.json,b.json",
        ]);

        assert_eq!(config.resources.len(), 2);
        let Command::Plan(args) = config.command else {
            panic!("expected the plan command");
        };
        assert_eq!(args.class, "App\\Entity\\Timesheet");
        assert_eq!(args.operation.as_deref(), Some("employee_timesheets"));
        assert_eq!(
            args.identifiers,
            vec![
                ("companyId".to_string(), "1".to_string()),
                ("employeeId".to_string(), "2".to_string())
            ]
        );
        assert_eq!(args.backend, Backend::Document);
    }

    #[test]
    fn test_identifier_requires_a_name() {
        assert!(parse_identifier("=1").is_err());
        assert!(parse_identifier("companyId").is_err());
        assert_eq!(
            parse_identifier("slug=a=b"),
            Ok(("slug".to_string(), "a=b".to_string()))
        );
    }

    #[test]
    fn test_validate_collects_every_error() {
        let config = parse(&[
            "plan",
            "Employee",
            "--resources",
            "/nonexistent/resources.json",
            "--log-level",
            "loud",
        ]);
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors[0].starts_with("Resource configuration not found"));
        assert_eq!(errors[1], "Planning a query requires at least one mapping file");
        assert!(errors[2].starts_with("Invalid log level"));
    }

    #[test]
    fn test_validate_accepts_existing_files() {
        let resources = temp_file();
        let config = parse(&[
            "resources",
            "--resources",
            resources.path().to_str().unwrap(),
            "--log-level",
            "DEBUG",
        ]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_resources_are_required() {
        let config = parse(&["resources"]);
        assert_eq!(
            config.validate().unwrap_err(),
            vec!["At least one resource configuration file is required".to_string()]
        );
    }
}
