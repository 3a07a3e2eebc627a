//! External line sort: the ordering stage between projection and reduction.
//!
//! Lines are buffered into runs of at most `run_lines` lines. Each full run
//! is sorted and spilled to a temporary file, and the runs are then merged
//! with a binary heap. At most `fan_in` runs are open at once: while more
//! runs than that are on disk, the oldest batch is merged into a single new
//! run. Memory use is bounded by one run plus one buffered line and one
//! reader per open run, whatever the size of the input.
//!
//! Lines come out in ascending byte order. Encoded keys never contain a raw
//! tab, so every line of one key shares the prefix `<key>\t` and sorting the
//! whole line keeps those lines contiguous.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::vec;

use tempfile::TempDir;
use tracing::{debug, info};

/// Runs merged at once unless configured otherwise.
pub const DEFAULT_FAN_IN: usize = 64;

/// How spilled runs are written to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    /// zstd at the given level.
    Zstd(i32),
}

/// Sorts line streams that may not fit in memory.
#[derive(Debug, Clone)]
pub struct ExternalSorter {
    run_lines: usize,
    fan_in: usize,
    spill_dir: Option<PathBuf>,
    compression: Compression,
}

impl ExternalSorter {
    /// A sorter holding at most `run_lines` lines in memory (minimum 1).
    pub fn new(run_lines: usize) -> Self {
        Self {
            run_lines: run_lines.max(1),
            fan_in: DEFAULT_FAN_IN,
            spill_dir: None,
            compression: Compression::None,
        }
    }

    /// Merge at most `fan_in` runs at once (minimum 2).
    #[must_use]
    pub fn fan_in(mut self, fan_in: usize) -> Self {
        self.fan_in = fan_in.max(2);
        self
    }

    /// Spill runs under `dir` instead of the system temp directory.
    #[must_use]
    pub fn spill_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.spill_dir = dir;
        self
    }

    #[must_use]
    pub fn compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Sort `lines`, returning an iterator over the sorted output.
    ///
    /// Read errors on the input and write errors while spilling are returned
    /// immediately. Read errors on spilled runs surface from the iterator.
    pub fn sort<I>(&self, lines: I) -> io::Result<SortedLines>
    where
        I: IntoIterator<Item = io::Result<String>>,
    {
        let mut buffer = Vec::with_capacity(self.run_lines.min(64 * 1024));
        let mut spill: Option<Spill> = None;

        for line in lines {
            buffer.push(line?);
            if buffer.len() >= self.run_lines {
                if spill.is_none() {
                    spill = Some(Spill::new(self.spill_tempdir()?));
                }
                if let Some(spill) = &mut spill {
                    buffer.sort_unstable();
                    let path = spill.next_path();
                    self.write_run(buffer.drain(..).map(Ok), &path)?;
                    spill.runs.push(path);
                    self.compact(spill)?;
                }
            }
        }

        buffer.sort_unstable();

        // `compact` keeps fewer than `fan_in` runs on disk, which leaves a
        // slot for the in-memory tail.
        let Some(spill) = spill else {
            debug!(lines = buffer.len(), "sorted in memory");
            return Ok(SortedLines {
                source: Source::Memory(buffer.into_iter()),
            });
        };

        info!(runs = spill.runs.len(), "merging spilled runs");
        let mut readers = Vec::with_capacity(spill.runs.len() + 1);
        for path in &spill.runs {
            readers.push(self.open_run(path)?);
        }
        if !buffer.is_empty() {
            readers.push(RunReader::Memory(buffer.into_iter()));
        }

        Ok(SortedLines {
            source: Source::Merge {
                merge: Merge::new(readers)?,
                _dir: spill.dir,
            },
        })
    }

    fn spill_tempdir(&self) -> io::Result<TempDir> {
        let dir = match &self.spill_dir {
            Some(parent) => TempDir::with_prefix_in("vessel-study-", parent)?,
            None => TempDir::with_prefix("vessel-study-")?,
        };
        debug!(path = %dir.path().display(), "spilling sort runs");
        Ok(dir)
    }

    /// Merge batches of the oldest runs until fewer than `fan_in` remain.
    fn compact(&self, spill: &mut Spill) -> io::Result<()> {
        while spill.runs.len() >= self.fan_in {
            self.merge_batch(spill, self.fan_in)?;
        }
        Ok(())
    }

    /// Merge the oldest `count` runs into one new run, deleting the inputs.
    fn merge_batch(&self, spill: &mut Spill, count: usize) -> io::Result<()> {
        let batch: Vec<PathBuf> = spill.runs.drain(..count).collect();
        let path = spill.next_path();

        let mut readers = Vec::with_capacity(batch.len());
        for run in &batch {
            readers.push(self.open_run(run)?);
        }
        self.write_run(Merge::new(readers)?, &path)?;

        for run in &batch {
            fs::remove_file(run)?;
        }
        debug!(runs = batch.len(), path = %path.display(), "merged intermediate run");
        spill.runs.push(path);
        Ok(())
    }

    /// Write already sorted `lines` to a run file at `path`.
    fn write_run(
        &self,
        lines: impl Iterator<Item = io::Result<String>>,
        path: &Path,
    ) -> io::Result<()> {
        let file = File::create(path)?;

        match self.compression {
            Compression::None => {
                let mut writer = BufWriter::new(file);
                write_lines(&mut writer, lines)?;
                writer.flush()?;
            }
            Compression::Zstd(level) => {
                let mut encoder = zstd::stream::write::Encoder::new(BufWriter::new(file), level)?;
                write_lines(&mut encoder, lines)?;
                encoder.finish()?.flush()?;
            }
        }

        debug!(path = %path.display(), "spilled sort run");
        Ok(())
    }

    fn open_run(&self, path: &Path) -> io::Result<RunReader> {
        let file = File::open(path)?;
        let reader: Box<dyn BufRead> = match self.compression {
            Compression::None => Box::new(BufReader::new(file)),
            Compression::Zstd(_) => Box::new(BufReader::new(zstd::stream::read::Decoder::new(file)?)),
        };
        Ok(RunReader::File(reader.lines()))
    }
}

fn write_lines(
    writer: &mut impl Write,
    lines: impl Iterator<Item = io::Result<String>>,
) -> io::Result<()> {
    for line in lines {
        writer.write_all(line?.as_bytes())?;
        writer.write_all(b"\n")?;
    }
    Ok(())
}

/// Spilled runs on disk, oldest first.
struct Spill {
    dir: TempDir,
    runs: Vec<PathBuf>,
    written: usize,
}

impl Spill {
    fn new(dir: TempDir) -> Self {
        Self {
            dir,
            runs: Vec::new(),
            written: 0,
        }
    }

    fn next_path(&mut self) -> PathBuf {
        let path = self.dir.path().join(format!("run-{:05}", self.written));
        self.written += 1;
        path
    }
}

/// One sorted run being merged.
enum RunReader {
    File(io::Lines<Box<dyn BufRead>>),
    Memory(vec::IntoIter<String>),
}

impl RunReader {
    fn next_line(&mut self) -> io::Result<Option<String>> {
        match self {
            Self::File(lines) => lines.next().transpose(),
            Self::Memory(lines) => Ok(lines.next()),
        }
    }
}

/// K-way merge over sorted runs.
struct Merge {
    /// Smallest pending line of each run, tagged with the run it came from.
    heap: BinaryHeap<Reverse<(String, usize)>>,
    readers: Vec<RunReader>,
}

impl Merge {
    fn new(readers: Vec<RunReader>) -> io::Result<Self> {
        let mut merge = Self {
            heap: BinaryHeap::with_capacity(readers.len()),
            readers,
        };
        for index in 0..merge.readers.len() {
            merge.refill(index)?;
        }
        Ok(merge)
    }

    fn refill(&mut self, index: usize) -> io::Result<()> {
        if let Some(line) = self.readers[index].next_line()? {
            self.heap.push(Reverse((line, index)));
        }
        Ok(())
    }

    fn next_line(&mut self) -> io::Result<Option<String>> {
        let Some(Reverse((line, index))) = self.heap.pop() else {
            return Ok(None);
        };
        self.refill(index)?;
        Ok(Some(line))
    }
}

impl Iterator for Merge {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_line().transpose()
    }
}

enum Source {
    Memory(vec::IntoIter<String>),
    Merge {
        merge: Merge,
        // Holds the spill directory until the merge is dropped.
        _dir: TempDir,
    },
}

/// Sorted output of an [`ExternalSorter`].
///
/// Spilled runs are deleted when this is dropped.
pub struct SortedLines {
    source: Source,
}

impl SortedLines {
    /// Whether the sort needed to spill to disk.
    pub fn spilled(&self) -> bool {
        matches!(self.source, Source::Merge { .. })
    }
}

impl Iterator for SortedLines {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.source {
            Source::Memory(lines) => lines.next().map(Ok),
            Source::Merge { merge, .. } => merge.next(),
        }
    }
}

/// Sort the lines of `reader` into `writer`.
pub fn sort_stream(
    sorter: &ExternalSorter,
    reader: impl BufRead,
    mut writer: impl Write,
) -> io::Result<u64> {
    let mut written = 0;
    for line in sorter.sort(reader.lines())? {
        writeln!(writer, "{}", line?)?;
        written += 1;
    }
    writer.flush()?;
    Ok(written)
}
