//! The whole study in one process: project, order, reduce.
//!
//! Two modes are available:
//!
//! - [`Mode::External`] keeps the map/sort/reduce shape. Projected lines go
//!   through the [`ExternalSorter`], so memory is bounded by the sort run
//!   size no matter how large the input is.
//! - [`Mode::InMemory`] skips the sort and accumulates every group in a
//!   single map. Memory grows with the number of groups and departures.
//!
//! Both modes produce the same set of aggregate records. Output order is
//! not part of the contract.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;

use tracing::info;

use crate::model::{GroupKey, IntermediateLine};
use crate::project::{ProjectStats, project, project_each};
use crate::reduce::{GroupAccumulator, ReduceStats, reduce_lines};
use crate::sort::ExternalSorter;

/// Errors that end a pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("failed to open {path}: {source}")]
    Open { path: PathBuf, source: io::Error },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = core::result::Result<T, PipelineError>;

/// How groups are brought together.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    /// Sort projected lines externally, then reduce the sorted stream.
    #[default]
    External,

    /// Accumulate all groups in memory in one pass.
    InMemory,
}

/// Where trip records are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Stdin,
    File(PathBuf),
}

impl Input {
    fn open(&self) -> Result<Box<dyn BufRead>> {
        match self {
            Self::Stdin => Ok(Box::new(io::stdin().lock())),
            Self::File(path) => {
                let file = File::open(path).map_err(|source| PipelineError::Open {
                    path: path.clone(),
                    source,
                })?;
                Ok(Box::new(BufReader::new(file)))
            }
        }
    }
}

/// Counters for a whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub project: ProjectStats,
    pub reduce: ReduceStats,
}

/// A configured end-to-end run.
#[derive(Debug, Clone)]
pub struct Pipeline {
    mode: Mode,
    sorter: ExternalSorter,
}

impl Pipeline {
    pub fn new(mode: Mode, sorter: ExternalSorter) -> Self {
        Self { mode, sorter }
    }

    /// Project every input, group, and write aggregate records to `writer`.
    pub fn run(&self, inputs: &[Input], writer: impl Write) -> Result<RunStats> {
        let stats = match self.mode {
            Mode::External => self.run_external(inputs, writer)?,
            Mode::InMemory => run_in_memory(inputs, writer)?,
        };

        info!(
            mode = ?self.mode,
            records = stats.project.emitted,
            groups = stats.reduce.groups,
            "pipeline finished"
        );
        Ok(stats)
    }

    fn run_external(&self, inputs: &[Input], writer: impl Write) -> Result<RunStats> {
        // Projected lines are handed to the sorter as they are produced;
        // only one sort run is ever held in memory.
        let mut projected = ProjectedLines::new(inputs);
        let sorted = self.sorter.sort(&mut projected)?;
        if let Some(err) = projected.failure.take() {
            return Err(err);
        }
        info!(spilled = sorted.spilled(), "projected lines sorted");

        let reduce = reduce_lines(sorted, writer)?;
        Ok(RunStats {
            project: projected.stats,
            reduce,
        })
    }
}

/// Single-pass accumulation keyed by group.
fn run_in_memory(inputs: &[Input], mut writer: impl Write) -> Result<RunStats> {
    let mut groups: BTreeMap<GroupKey, GroupAccumulator> = BTreeMap::new();
    let mut project = ProjectStats::default();

    for input in inputs {
        let stats = project_each(input.open()?, |line| {
            add_to_group(&mut groups, line);
            Ok(())
        })?;
        add_stats(&mut project, stats);
    }

    let mut reduce = ReduceStats {
        read: project.emitted,
        ..ReduceStats::default()
    };
    for (key, acc) in groups {
        writeln!(writer, "{}", acc.finish(key).encode())?;
        reduce.groups += 1;
    }
    writer.flush()?;

    Ok(RunStats { project, reduce })
}

fn add_to_group(groups: &mut BTreeMap<GroupKey, GroupAccumulator>, line: IntermediateLine) {
    match groups.get_mut(&line.key) {
        Some(acc) => acc.add(line),
        None => {
            groups.insert(line.key.clone(), GroupAccumulator::seeded(line));
        }
    }
}

fn add_stats(total: &mut ProjectStats, more: ProjectStats) {
    total.read += more.read;
    total.emitted += more.emitted;
    total.skipped += more.skipped;
}

/// Lazily projects every input in turn, yielding encoded lines.
///
/// A failure to open an input ends the iteration and is kept in `failure`,
/// apart from read errors, which are yielded.
struct ProjectedLines<'a> {
    inputs: std::slice::Iter<'a, Input>,
    current: Option<Box<dyn BufRead>>,
    stats: ProjectStats,
    failure: Option<PipelineError>,
}

impl<'a> ProjectedLines<'a> {
    fn new(inputs: &'a [Input]) -> Self {
        Self {
            inputs: inputs.iter(),
            current: None,
            stats: ProjectStats::default(),
            failure: None,
        }
    }
}

impl Iterator for ProjectedLines<'_> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let Some(reader) = self.current.as_mut() else {
                match self.inputs.next()?.open() {
                    Ok(reader) => self.current = Some(reader),
                    Err(e) => {
                        self.failure = Some(e);
                        return None;
                    }
                }
                continue;
            };

            let mut raw = String::new();
            match reader.read_line(&mut raw) {
                Ok(0) => {
                    self.current = None;
                    continue;
                }
                Ok(_) => {}
                Err(e) => return Some(Err(e)),
            }

            if raw.trim().is_empty() {
                continue;
            }
            self.stats.read += 1;
            match project(&raw) {
                Some(line) => {
                    self.stats.emitted += 1;
                    return Some(Ok(line.encode()));
                }
                None => self.stats.skipped += 1,
            }
        }
    }
}
