//! Operator CLI for schema-driven CRUD.
//!
//! # Responsibility
//! - Wire config, schema, database and registry together for one invocation.
//! - Print results as JSON so output can be piped into other tools.

use clap::{Parser, Subcommand};
use schemacrud_core::schema::load_from_path;
use schemacrud_core::{core_version, init_from_config, CoreConfig, CruderRegistry, Database};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "schemacrud")]
#[command(version, about = "Generic CRUD over a declarative schema", long_about = None)]
struct Cli {
    /// JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Schema file (overrides config)
    #[arg(long, global = true)]
    schema: Option<PathBuf>,

    /// SQLite database file (overrides config)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create missing tables and list every model with its columns
    Tables,

    /// Run one CRUD call, e.g. `call /users/read '{"where": {"id": 1}}'`
    Call {
        /// Route of the form /<model>/<create|read|update|delete>
        route: String,

        /// JSON request body
        #[arg(default_value = "{}")]
        body: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), String> {
    let mut config = match &cli.config {
        Some(path) => CoreConfig::from_path(path).map_err(|err| err.to_string())?,
        None => CoreConfig::default(),
    };
    if let Some(schema) = cli.schema {
        config.schema_path = schema;
    }
    if let Some(db) = cli.db {
        config.database.path = Some(db);
    }

    init_from_config(&config.logging).map_err(|err| err.to_string())?;
    log::info!(
        "event=cli_start module=cli status=ok core_version={}",
        core_version()
    );

    let models = load_from_path(&config.schema_path).map_err(|err| err.to_string())?;
    let db = Database::open(&config.database).map_err(|err| err.to_string())?;
    let registry = CruderRegistry::new(Arc::new(db), models);
    let created = registry.ensure_tables().map_err(|err| err.to_string())?;
    if !created.is_empty() {
        log::info!(
            "event=tables_created module=cli status=ok tables={}",
            created.join(",")
        );
    }

    match cli.command {
        Commands::Tables => {
            for name in registry.model_names() {
                if let Some(cruder) = registry.get(name) {
                    println!("{name}: {}", cruder.model().ddl_columns());
                }
            }
            Ok(())
        }
        Commands::Call { route, body } => {
            let body: serde_json::Value =
                serde_json::from_str(&body).map_err(|err| format!("invalid JSON body: {err}"))?;
            let outcome = registry
                .dispatch_path(&route, &body)
                .map_err(|err| format!("{} ({})", err, err.code()))?;
            let rendered = serde_json::to_string_pretty(&outcome.into_json())
                .map_err(|err| err.to_string())?;
            println!("{rendered}");
            Ok(())
        }
    }
}
