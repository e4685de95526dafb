//! Trellis command line.
//!
//! Loads resource configuration and persistence mappings, then lists resources,
//! prints their resolved metadata or plans the query scoping a nested resource.

mod commands;
mod config;

use clap::Parser;
use tracing::debug;

use crate::config::CliConfig;

/// Installs the `fmt` subscriber. `RUST_LOG` overrides `level`.
fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let level = level.to_lowercase();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "trellis={level},trellis_metadata={level},trellis_persistence={level}"
        ))
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();
    init_logging(&config.log_level);

    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("Configuration error: {}", error);
        }
        std::process::exit(1);
    }

    debug!(command = ?config.command, "Running command");
    let output = commands::run(&config)?;
    println!("{}", output);
    Ok(())
}
