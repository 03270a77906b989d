//! emix-db - Main entry point.
//!
//! Opens the configured connections and, when `--sql` is given, prints the
//! page layout for the requested page as JSON.

use clap::Parser;
use emix_db::config::Config;
use emix_db::db::ConnectionRegistry;
use emix_db::models::QueryParam;
use emix_db::DbError;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

/// Pick the connection to query: the explicit name, or the only one there is.
async fn target_name(config: &Config, registry: &ConnectionRegistry) -> Result<String, DbError> {
    if let Some(name) = &config.database {
        return Ok(name.clone());
    }
    let mut names = registry.names().await;
    match names.len() {
        1 => Ok(names.remove(0)),
        0 => Err(DbError::invalid_input("No database connections are configured")),
        _ => Err(DbError::invalid_input(format!(
            "Several connections are configured ({}); pick one with --database",
            names.join(", ")
        ))),
    }
}

async fn run(config: &Config) -> Result<(), DbError> {
    let db_configs = config.load_databases()?;
    info!(count = db_configs.len(), "Opening configured databases");

    let registry = ConnectionRegistry::from_configs(&db_configs).await?;
    for name in registry.names().await {
        println!("{}", name);
    }

    if let Some(sql) = &config.sql {
        let name = target_name(config, &registry).await?;
        let params: Vec<QueryParam> = config
            .params
            .iter()
            .map(|p| QueryParam::from_cli_arg(p))
            .collect();

        let pager = registry
            .pager(&name, config.page, config.page_size)
            .await?
            .with_query(sql, params)
            .await?;

        let info = serde_json::to_string_pretty(&pager.info())
            .map_err(|e| DbError::invalid_input(format!("Failed to render page info: {}", e)))?;
        println!("{}", info);
    }

    registry.close_all().await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();
    init_tracing(&config);

    info!("Starting emix-db v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&config).await {
        error!(error = %e, fatal = e.is_fatal(), "emix-db failed");
        if let Some(suggestion) = e.suggestion() {
            eprintln!("Hint: {}", suggestion);
        }
        return Err(e.into());
    }

    Ok(())
}
