use crate::errors::AppResult;
use crate::settings::Settings;
use clap::{Parser, Subcommand};

pub mod commands;

/// Run SQL inside a scoped database connection
#[derive(Parser)]
#[command(name = "mysql-helper")]
#[command(about = "Run SQL inside a scoped database connection")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Execute one statement, commit on success, print the result as JSON
    Query(commands::query::QueryCommand),
    /// Test database connectivity
    Ping(commands::ping::PingCommand),
}

pub fn run() -> AppResult<()> {
    let settings = Settings::load()?;

    // RUST_LOG wins; otherwise the configured log level (default "error")
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.log_level)),
        )
        .try_init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Query(command) => command.run(&settings),
        Commands::Ping(command) => command.run(&settings),
    }
}
