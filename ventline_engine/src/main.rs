use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use ventline_engine::cli::{self, ConsoleMessenger};
use ventline_engine::config::VentlineConfig;
use ventline_engine::database::Database;
use ventline_engine::service::DiscussionService;
use ventline_engine::telemetry;

#[derive(Parser)]
#[command(author, version, about = "Ventline discussion engine daemon and CLI")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the interactive CLI driving the discussion engine
    Cli,
}

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_tracing();

    let args = Args::parse();

    let config = VentlineConfig::from_env()?;
    std::fs::create_dir_all(&config.paths.data_dir)?;
    let database = Database::connect(&config.paths)?;
    let newly_created = database.ensure_migrations()?;
    tracing::info!(
        db_path = %config.paths.db_path.display(),
        newly_created,
        "database ready"
    );

    let messenger = Arc::new(ConsoleMessenger::new());
    let service = DiscussionService::new(database, messenger, &config);

    match args.command.unwrap_or(Command::Cli) {
        Command::Cli => cli::run_cli(service, config).await,
    }
}
