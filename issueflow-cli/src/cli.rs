use clap::{Parser, Subcommand, ValueEnum};
use is_terminal::IsTerminal;
use std::io;
use std::path::PathBuf;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
pub enum OutputFormat {
    Table,
    Json,
    Yaml,
}

#[derive(Parser, Debug)]
#[command(name = "issueflow")]
#[command(version)]
#[command(about = "Transition-time analytics and resumable ingestion for issue trackers")]
#[command(long_about = "
issueflow ingests an issue tracker's search results in bounded, resumable
steps and turns each issue's status history into business-time metrics,
a flattened working set, a changelog and an operational cost rollup.

Example usage:
  issueflow ingest                 # Run one bounded ingestion step
  issueflow status                 # Show the stored checkpoint
  issueflow analyze export.json    # Analyze a tracker payload directly
  issueflow cost --output cost.csv # Write the cost rollup
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration file to use instead of searching for issueflow.yaml
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one bounded ingestion step
    #[command(long_about = "
Runs one invocation of the ingestion state machine. Each invocation probes
the source for the current item count, restarts from scratch when the count
changed, and then performs at most one budgeted unit of work:

- fetching pages of items into the record store
- writing a batch of working-set rows
- writing a batch of changelog rows

Run it repeatedly (for example from a scheduler) until the stage is 'done'.

Exit codes:
  0 - Step completed
  1 - Transient failure, safe to retry
  2 - Configuration or persistence error

Examples:
  issueflow ingest
  issueflow ingest --until-done
  issueflow ingest --format json
")]
    Ingest {
        /// Keep invoking until ingestion is done or stops making progress
        #[arg(long)]
        until_done: bool,

        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
    /// Show the stored ingestion checkpoint
    Status {
        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
    /// Discard ingestion progress and clear every output
    Reset,
    /// Analyze a tracker payload without ingesting it
    #[command(long_about = "
Reads a JSON file holding a tracker search response, an array of issues or a
single issue, and prints the metrics derived from each status history.

Examples:
  issueflow analyze export.json
  issueflow analyze export.json --format json
")]
    Analyze {
        /// Path to the JSON payload
        payload: PathBuf,

        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
    /// Attribute operational cost to ingested work items
    #[command(long_about = "
Reads the ingested records and prints one cost row per task, subtask or bug
that has an assignee and either a cycle time or an estimate. With --output
the rows are written to a CSV file with a header instead.

Examples:
  issueflow cost
  issueflow cost --output cost.csv
")]
    Cost {
        /// Write CSV to this file instead of printing
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format when printing
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    #[allow(dead_code)]
    pub fn try_parse_from_args<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(args)
    }

    pub fn is_tty() -> bool {
        io::stdout().is_terminal()
    }

    pub fn should_use_color() -> bool {
        Self::is_tty() && std::env::var("NO_COLOR").is_err()
    }
}
