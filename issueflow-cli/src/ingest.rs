use crate::cli::{Cli, OutputFormat};
use crate::context;
use crate::error::{CliError, CliResult};
use crate::exit_codes::EXIT_ERROR;
use colored::*;
use issueflow::ingest::{IngestionCheckpoint, IngestionStage, InvocationReport};
use issueflow::issues::record::format_timestamp;
use issueflow::Config;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

/// Upper bound on invocations made by `--until-done`
const MAX_INVOCATIONS: usize = 10_000;

#[derive(Tabled)]
struct FieldRow {
    #[tabled(rename = "Field")]
    field: String,
    #[tabled(rename = "Value")]
    value: String,
}

fn row(field: &str, value: impl ToString) -> FieldRow {
    FieldRow {
        field: field.to_string(),
        value: value.to_string(),
    }
}

fn stage_label(stage: IngestionStage) -> String {
    if !Cli::should_use_color() {
        return stage.to_string();
    }
    match stage {
        IngestionStage::Done => stage.to_string().green().to_string(),
        IngestionStage::Fetching => stage.to_string().yellow().to_string(),
        _ => stage.to_string().cyan().to_string(),
    }
}

fn checkpoint_rows(checkpoint: &IngestionCheckpoint) -> Vec<FieldRow> {
    vec![
        row("Stage", stage_label(checkpoint.stage)),
        row("Total items", checkpoint.total_item_count),
        row("Fetched items", checkpoint.processed_item_count()),
        row("Remaining items", checkpoint.remaining_item_count),
        row("Next offset", checkpoint.last_start_offset),
        row("Working-set rows", checkpoint.working_set_row),
        row("Changelog rows", checkpoint.changelog_row),
        row(
            "Updated",
            checkpoint
                .updated_at
                .as_ref()
                .map(format_timestamp)
                .unwrap_or_else(|| "-".to_string()),
        ),
    ]
}

fn print_table(rows: Vec<FieldRow>) {
    let mut table = Table::new(rows);
    table.with(Style::modern());
    table.with(Modify::new(Rows::new(1..)).with(Alignment::left()));
    println!("{}", table);
}

fn print_report(report: &InvocationReport, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(report)
                .map_err(|e| CliError::from_error(e, EXIT_ERROR))?;
            println!("{}", json);
        }
        OutputFormat::Yaml => {
            let yaml =
                serde_yaml::to_string(report).map_err(|e| CliError::from_error(e, EXIT_ERROR))?;
            print!("{}", yaml);
        }
        OutputFormat::Table => {
            let mut rows = vec![row(
                "Stage change",
                format!(
                    "{} -> {}",
                    stage_label(report.stage_before),
                    stage_label(report.stage_after)
                ),
            )];
            if report.drift_detected {
                rows.push(row("Drift", "item count changed; restarted"));
            } else if report.reset_performed {
                rows.push(row("Reset", "started from scratch"));
            }
            rows.push(row("Items fetched", report.items_fetched));
            rows.push(row("Rows written", report.rows_written));
            rows.extend(checkpoint_rows(&report.checkpoint).into_iter().skip(1));
            print_table(rows);
        }
    }
    Ok(())
}

pub async fn run_ingest(config: &Config, until_done: bool, format: OutputFormat) -> CliResult<()> {
    let controller = context::controller(config)?;

    if !until_done {
        let report = controller.run_once().await?;
        return print_report(&report, format);
    }

    let mut invocations = 0;
    loop {
        let report = controller.run_once().await?;
        invocations += 1;

        let stalled = report.items_fetched == 0
            && report.rows_written == 0
            && report.stage_before == report.stage_after
            && !report.reset_performed;

        if report.stage_after == IngestionStage::Done || stalled || invocations >= MAX_INVOCATIONS {
            if stalled && report.stage_after != IngestionStage::Done {
                tracing::warn!(
                    "Ingestion stopped making progress at stage {}",
                    report.stage_after
                );
            }
            tracing::info!("Ran {} ingestion invocations", invocations);
            return print_report(&report, format);
        }
    }
}

pub async fn run_status(config: &Config, format: OutputFormat) -> CliResult<()> {
    let controller = context::local_controller(config)?;
    let checkpoint = controller.checkpoint().await?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&checkpoint)
                .map_err(|e| CliError::from_error(e, EXIT_ERROR))?;
            println!("{}", json);
        }
        OutputFormat::Yaml => {
            let yaml = serde_yaml::to_string(&checkpoint)
                .map_err(|e| CliError::from_error(e, EXIT_ERROR))?;
            print!("{}", yaml);
        }
        OutputFormat::Table => match checkpoint {
            Some(checkpoint) => print_table(checkpoint_rows(&checkpoint)),
            None => println!("No ingestion has run yet."),
        },
    }
    Ok(())
}

pub async fn run_reset(config: &Config) -> CliResult<()> {
    let controller = context::local_controller(config)?;
    controller.reset().await?;
    println!("Ingestion state cleared in {}", config.data_dir.display());
    Ok(())
}
