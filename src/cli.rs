//! CLI interface for the vessel study.
//!
//! Every stage can run on its own, reading stdin and writing stdout, so the
//! study can be driven by any map/sort/reduce runner:
//!
//! ```text
//! vessel-study map < trips.jsonl | vessel-study sort | vessel-study reduce > results.tsv
//! ```
//!
//! `run` does the same in one process, and `report` summarizes the results.

mod format;

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use tracing::info;

use crate::config::Config;
use crate::partition::partition_file_name;
use crate::pipeline::{Input, Mode, Pipeline};
use crate::project::{project_partitioned, project_stream};
use crate::reduce::reduce_stream;
use crate::report::{Report, read_records};
use crate::sort::sort_stream;

use format::format_report;

/// Vessel study: trips, passengers, and crew per vessel and rig.
#[derive(Debug, Parser)]
#[command(name = "vessel-study", version, after_long_help = WORKFLOW_HELP)]
pub struct Cli {
    /// Config file (default: `~/.vessel-study/config.toml`, if present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log more to stderr. Repeat for debug output.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

const WORKFLOW_HELP: &str = r"Workflow:
  vessel-study run trips/*.jsonl --out results.tsv
  vessel-study report results.tsv

As separate stages:
  vessel-study map < trips.jsonl | vessel-study sort | vessel-study reduce > results.tsv

Sharded:
  vessel-study map --partitions 4 --out-dir shards < trips.jsonl
  vessel-study sort < shards/part-00000 | vessel-study reduce > results-0.tsv";

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Project trip records (JSON lines on stdin) to intermediate lines.
    ///
    /// Writes `vessel|rig<TAB>departure|is_crew|is_passenger` per record.
    /// Unparsable lines are dropped.
    Map {
        /// Split output into this many key partitions.
        #[arg(long, requires = "out_dir", value_parser = clap::value_parser!(u32).range(1..))]
        partitions: Option<u32>,

        /// Directory for partition files (`part-00000`, ...).
        #[arg(long, requires = "partitions")]
        out_dir: Option<PathBuf>,
    },

    /// Sort lines from stdin to stdout, spilling to disk when needed.
    Sort,

    /// Reduce sorted intermediate lines from stdin to aggregate rows.
    ///
    /// Input must have every line of a key together; a key that reappears
    /// later produces a second row.
    Reduce,

    /// Run projection, sorting, and reduction in one process.
    Run {
        /// Trip record files. Reads stdin when none are given.
        inputs: Vec<PathBuf>,

        /// Write aggregate rows to this file instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,

        /// Group in memory instead of sorting.
        ///
        /// Faster, but memory grows with the number of vessel/rig groups.
        #[arg(long)]
        in_memory: bool,
    },

    /// Summarize an aggregate results file.
    Report {
        /// Results file written by `reduce` or `run`.
        results: PathBuf,

        /// Rows per ranking (default from config, else 10).
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        limit: Option<u32>,

        #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
        format: ReportFormat,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Aligned tables.
    Text,
    /// One JSON document.
    Json,
}

/// Run the CLI, returning an error message on failure.
pub fn run(cli: Cli) -> Result<(), String> {
    let config = Config::load(cli.config.as_deref()).map_err(|e| e.to_string())?;

    match cli.command {
        Command::Map {
            partitions,
            out_dir,
        } => match (partitions, out_dir) {
            (Some(count), Some(dir)) => cmd_map_partitioned(count, &dir),
            _ => cmd_map(),
        },
        Command::Sort => cmd_sort(&config),
        Command::Reduce => cmd_reduce(),
        Command::Run {
            inputs,
            out,
            in_memory,
        } => cmd_run(&config, &inputs, out.as_deref(), in_memory),
        Command::Report {
            results,
            limit,
            format,
        } => cmd_report(&config, &results, limit, format),
    }
}

fn cmd_map() -> Result<(), String> {
    let stdin = io::stdin().lock();
    let stdout = BufWriter::new(io::stdout().lock());
    project_stream(stdin, stdout).map_err(|e| format!("map failed: {e}"))?;
    Ok(())
}

fn cmd_map_partitioned(count: u32, dir: &Path) -> Result<(), String> {
    fs::create_dir_all(dir).map_err(|e| format!("failed to create {}: {e}", dir.display()))?;

    let mut writers = Vec::new();
    for index in 0..count as usize {
        let path = dir.join(partition_file_name(index));
        let file =
            File::create(&path).map_err(|e| format!("failed to create {}: {e}", path.display()))?;
        writers.push(BufWriter::new(file));
    }

    let stats = project_partitioned(io::stdin().lock(), &mut writers)
        .map_err(|e| format!("map failed: {e}"))?;

    eprintln!(
        "Projected {} record(s) into {count} partition(s) in {}",
        stats.emitted,
        dir.display()
    );
    Ok(())
}

fn cmd_sort(config: &Config) -> Result<(), String> {
    let stdout = BufWriter::new(io::stdout().lock());
    let written = sort_stream(&config.sorter(), io::stdin().lock(), stdout)
        .map_err(|e| format!("sort failed: {e}"))?;
    info!(lines = written, "sort finished");
    Ok(())
}

fn cmd_reduce() -> Result<(), String> {
    let stdout = BufWriter::new(io::stdout().lock());
    reduce_stream(io::stdin().lock(), stdout).map_err(|e| format!("reduce failed: {e}"))?;
    Ok(())
}

fn cmd_run(
    config: &Config,
    inputs: &[PathBuf],
    out: Option<&Path>,
    in_memory: bool,
) -> Result<(), String> {
    let inputs: Vec<Input> = if inputs.is_empty() {
        vec![Input::Stdin]
    } else {
        inputs.iter().cloned().map(Input::File).collect()
    };
    let mode = if in_memory {
        Mode::InMemory
    } else {
        Mode::External
    };
    let pipeline = Pipeline::new(mode, config.sorter());

    let writer: Box<dyn Write> = match out {
        Some(path) => {
            let file = File::create(path)
                .map_err(|e| format!("failed to create {}: {e}", path.display()))?;
            Box::new(BufWriter::new(file))
        }
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    let stats = pipeline
        .run(&inputs, writer)
        .map_err(|e| format!("run failed: {e}"))?;

    if let Some(path) = out {
        eprintln!(
            "Aggregated {} record(s) into {} group(s) → {}",
            stats.project.emitted,
            stats.reduce.groups,
            path.display()
        );
    }
    Ok(())
}

fn cmd_report(
    config: &Config,
    results: &Path,
    limit: Option<u32>,
    format: ReportFormat,
) -> Result<(), String> {
    let file =
        File::open(results).map_err(|e| format!("failed to open {}: {e}", results.display()))?;
    let records = read_records(BufReader::new(file))
        .map_err(|e| format!("failed to read {}: {e}", results.display()))?;

    if records.is_empty() && format == ReportFormat::Text {
        println!("No results");
        return Ok(());
    }

    let limit = limit.map_or(config.report_limit, |n| n as usize);
    let report = Report::build(&records, limit);

    match format {
        ReportFormat::Text => print!("{}", format_report(&report)),
        ReportFormat::Json => {
            let json = serde_json::to_string_pretty(&report)
                .map_err(|e| format!("failed to serialize report: {e}"))?;
            println!("{json}");
        }
    }
    Ok(())
}
