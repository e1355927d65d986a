use std::process;
mod analyze;
mod cli;
mod context;
mod cost;
mod error;
mod exit_codes;
mod ingest;

use clap::CommandFactory;
use cli::{Cli, Commands};
use error::handle_cli_result;
use exit_codes::{EXIT_ERROR, EXIT_SUCCESS};

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    // Fast path for help
    let Some(command) = cli.command else {
        if let Err(e) = Cli::command().print_help() {
            eprintln!("Failed to print help: {}", e);
            process::exit(EXIT_ERROR);
        }
        process::exit(EXIT_SUCCESS);
    };

    use tracing::Level;

    let log_level = if cli.quiet {
        Level::ERROR
    } else if cli.debug {
        Level::DEBUG
    } else if cli.verbose {
        Level::TRACE
    } else {
        Level::INFO
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(log_level)
        .init();

    let config = match context::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => process::exit(handle_cli_result::<()>(Err(e))),
    };

    let exit_code = match command {
        Commands::Ingest { until_done, format } => {
            tracing::debug!("Running ingest command");
            handle_cli_result(ingest::run_ingest(&config, until_done, format).await)
        }
        Commands::Status { format } => {
            tracing::debug!("Running status command");
            handle_cli_result(ingest::run_status(&config, format).await)
        }
        Commands::Reset => {
            tracing::info!("Resetting ingestion state");
            handle_cli_result(ingest::run_reset(&config).await)
        }
        Commands::Analyze { payload, format } => {
            tracing::debug!("Running analyze command");
            handle_cli_result(analyze::run_analyze(&config, &payload, format))
        }
        Commands::Cost { output, format } => {
            tracing::debug!("Running cost command");
            handle_cli_result(cost::run_cost(&config, output.as_deref(), format).await)
        }
    };

    process::exit(exit_code);
}
