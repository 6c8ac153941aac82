use clap::Parser;
use pmflow_cli::{
    app::{build_engine, build_services, dispatch},
    cli::{Cli, Command},
    config::AppConfig,
    db::PgRepository,
    error::CliError,
};
use pmflow_tasks::InMemoryWorkItemStore;
use pmflow_workflow::InMemoryRepository;
use rootcause::prelude::Report;
use sqlx::postgres::PgPoolOptions;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match run(cli.command).await {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(report) => {
            eprintln!("{report}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> Result<String, Report<CliError>> {
    let config = AppConfig::from_env().map_err(|e| CliError::Config {
        details: e.to_string(),
    })?;
    tracing::info!("Loaded configuration");

    let Some(database_url) = config.database_url.as_deref() else {
        tracing::warn!("no DATABASE_URL configured; workflows are kept in memory");
        let services = build_services(&config, Arc::new(InMemoryWorkItemStore::new()));
        let engine = build_engine(InMemoryRepository::new(), &services, &config);
        return dispatch(&engine, command).await;
    };

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .map_err(|e| CliError::Database {
            details: e.to_string(),
        })?;

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| CliError::Database {
            details: e.to_string(),
        })?;

    let repository = PgRepository::new(pool);
    let services = build_services(&config, Arc::new(repository.clone()));
    let engine = build_engine(repository, &services, &config);
    dispatch(&engine, command).await
}
