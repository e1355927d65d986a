use crate::cli::OutputFormat;
use crate::error::{CliError, CliResult};
use crate::exit_codes::EXIT_ERROR;
use issueflow::cost::{CostRow, COST_COLUMNS};
use issueflow::ingest::{
    load_checkpoint, FileSystemCheckpointStore, IngestionStage, JsonLinesRecordStore, RecordStore,
};
use issueflow::Config;
use std::path::Path;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

#[derive(Tabled)]
struct CostTableRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Type")]
    item_type: String,
    #[tabled(rename = "Assignee")]
    assignee: String,
    #[tabled(rename = "Epic / Story")]
    parent: String,
    #[tabled(rename = "Opex")]
    opex: String,
    #[tabled(rename = "Estimate (h)")]
    estimate: String,
    #[tabled(rename = "Cycle (h)")]
    cycle: String,
    #[tabled(rename = "Est. cost")]
    estimated_cost: String,
    #[tabled(rename = "Actual cost")]
    actual_cost: String,
}

impl From<&CostRow> for CostTableRow {
    fn from(row: &CostRow) -> Self {
        let text = |s: Option<String>| s.unwrap_or_else(|| "-".to_string());
        Self {
            key: row.key.clone(),
            item_type: row.item_type.clone(),
            assignee: row.assignee.clone(),
            parent: text(row.epic.clone().or_else(|| row.story.clone())),
            opex: if row.opex { "yes" } else { "" }.to_string(),
            estimate: text(row.estimate_hours.map(|h| h.to_string())),
            cycle: text(row.cycle_time.map(|c| c.to_hours_string())),
            estimated_cost: text(row.estimated_cost.map(|c| c.to_string())),
            actual_cost: text(row.actual_cost.map(|c| c.to_string())),
        }
    }
}

/// Serialize cost rows as CSV with a header line
pub fn cost_csv(rows: &[CostRow]) -> anyhow::Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(COST_COLUMNS)?;
    for row in rows {
        writer.write_record(row.to_row())?;
    }
    Ok(writer.into_inner()?)
}

fn write_csv(path: &Path, rows: &[CostRow]) -> CliResult<()> {
    let bytes = cost_csv(rows).map_err(|e| CliError::from_anyhow(e, EXIT_ERROR))?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| CliError::from_error(e, EXIT_ERROR))?;
    }
    std::fs::write(path, bytes).map_err(|e| CliError::from_error(e, EXIT_ERROR))?;
    Ok(())
}

pub async fn run_cost(
    config: &Config,
    output: Option<&Path>,
    format: OutputFormat,
) -> CliResult<()> {
    let checkpoints = FileSystemCheckpointStore::new(config.checkpoint_path());
    if let Some(checkpoint) = load_checkpoint(&checkpoints).await? {
        if checkpoint.stage != IngestionStage::Done {
            tracing::warn!(
                "Ingestion is still at stage {}; cost rows cover a partial set of issues",
                checkpoint.stage
            );
        }
    }

    let store = JsonLinesRecordStore::new(config.records_path());
    let records = store.read_all().await?;
    if records.is_empty() {
        tracing::warn!(
            "No records in {}; run `issueflow ingest` first",
            config.records_path().display()
        );
    }

    let rows = config.cost_attributor().attribute(&records);
    tracing::info!("{} of {} records carry cost", rows.len(), records.len());

    if let Some(path) = output {
        write_csv(path, &rows)?;
        println!("Wrote {} cost rows to {}", rows.len(), path.display());
        return Ok(());
    }

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&rows)
                .map_err(|e| CliError::from_error(e, EXIT_ERROR))?;
            println!("{}", json);
        }
        OutputFormat::Yaml => {
            let yaml =
                serde_yaml::to_string(&rows).map_err(|e| CliError::from_error(e, EXIT_ERROR))?;
            print!("{}", yaml);
        }
        OutputFormat::Table => {
            if rows.is_empty() {
                println!("No costed work items.");
                return Ok(());
            }
            let mut table = Table::new(rows.iter().map(CostTableRow::from));
            table.with(Style::modern());
            table.with(Modify::new(Rows::new(1..)).with(Alignment::left()));
            println!("{}", table);
        }
    }
    Ok(())
}
