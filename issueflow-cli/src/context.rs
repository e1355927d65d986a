//! Builds the library objects a command needs from the layered configuration

use crate::error::{CliError, CliResult};
use crate::exit_codes::EXIT_ERROR;
use issueflow::ingest::{
    CsvRowSink, FileSystemCheckpointStore, FileSystemIssueSource, IngestionController,
    JsonLinesRecordStore,
};
use issueflow::Config;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Load and validate the configuration
pub fn load_config(explicit: Option<&Path>) -> CliResult<Config> {
    let config = match explicit {
        Some(path) => Config::load_from(path)?,
        None => Config::new(),
    };
    config.validate()?;
    tracing::debug!("Using data directory {}", config.data_dir.display());
    Ok(config)
}

fn source_path(config: &Config) -> CliResult<PathBuf> {
    config.source_path.clone().ok_or_else(|| {
        CliError::new(
            "No issue source configured. Set source_path in issueflow.yaml or ISSUEFLOW_SOURCE_PATH.",
            EXIT_ERROR,
        )
    })
}

fn build_controller(config: &Config, source: PathBuf) -> CliResult<IngestionController> {
    Ok(IngestionController::new(
        Arc::new(FileSystemIssueSource::new(source)),
        Arc::new(FileSystemCheckpointStore::new(config.checkpoint_path())),
        Arc::new(JsonLinesRecordStore::new(config.records_path())),
        Arc::new(CsvRowSink::new(config.working_set_path())),
        Arc::new(CsvRowSink::new(config.changelog_path())),
        config.extractor()?,
        config.controller_settings(),
    ))
}

/// A controller reading from the configured source
pub fn controller(config: &Config) -> CliResult<IngestionController> {
    build_controller(config, source_path(config)?)
}

/// A controller for commands that only touch local state
///
/// The source is never queried, so it need not be configured.
pub fn local_controller(config: &Config) -> CliResult<IngestionController> {
    build_controller(config, config.source_path.clone().unwrap_or_default())
}
