//! Group reduction over a key-sorted intermediate stream.
//!
//! The reducer keeps exactly one group open at a time. Each time the key
//! changes the open group is flushed as an [`AggregateRecord`] and a fresh
//! one starts; the last group is flushed at end of input.
//!
//! Input must be ordered so that every line of a key is contiguous. That is
//! assumed, not checked: a key that reappears after another key has been
//! seen comes out as a second, separate record.

use std::collections::HashSet;
use std::io::{self, BufRead, Write};

use tracing::{debug, info};

use crate::model::{AggregateRecord, GroupKey, IntermediateLine};

/// Running totals for one group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupAccumulator {
    pub crew: u64,
    pub passengers: u64,
    /// Distinct departures; a trip counts once however many people were on it.
    pub trips: HashSet<String>,
}

impl GroupAccumulator {
    /// A new accumulator holding just `line`.
    pub fn seeded(line: IntermediateLine) -> Self {
        let mut acc = Self::default();
        acc.add(line);
        acc
    }

    pub fn add(&mut self, line: IntermediateLine) {
        self.crew += u64::from(line.is_crew);
        self.passengers += u64::from(line.is_passenger);
        self.trips.insert(line.departure);
    }

    /// Close the group under `key`.
    pub fn finish(self, key: GroupKey) -> AggregateRecord {
        AggregateRecord {
            vessel: key.vessel,
            rig: key.rig,
            trips: self.trips.len() as u64,
            passengers: self.passengers,
            crew: self.crew,
        }
    }
}

#[derive(Debug, Default)]
enum State {
    #[default]
    NoActiveGroup,
    ActiveGroup {
        key: GroupKey,
        acc: GroupAccumulator,
    },
}

/// The streaming reducer.
#[derive(Debug, Default)]
pub struct Reducer {
    state: State,
}

impl Reducer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one decoded line. Returns the previous group if this line
    /// starts a new one.
    pub fn push(&mut self, line: IntermediateLine) -> Option<AggregateRecord> {
        if let State::ActiveGroup { key, acc } = &mut self.state
            && *key == line.key
        {
            acc.add(line);
            return None;
        }

        let key = line.key.clone();
        let next = State::ActiveGroup {
            key,
            acc: GroupAccumulator::seeded(line),
        };
        match std::mem::replace(&mut self.state, next) {
            State::ActiveGroup { key, acc } => Some(acc.finish(key)),
            State::NoActiveGroup => None,
        }
    }

    /// Flush the open group, if any.
    pub fn finish(self) -> Option<AggregateRecord> {
        match self.state {
            State::ActiveGroup { key, acc } => Some(acc.finish(key)),
            State::NoActiveGroup => None,
        }
    }
}

/// Decode one raw line, logging and dropping it if malformed.
///
/// Only the line terminator is stripped. Whitespace inside the line belongs
/// to the fields.
fn decode(raw: &str) -> Option<IntermediateLine> {
    let raw = raw.trim_end_matches(['\r', '\n']);
    if raw.is_empty() {
        return None;
    }
    match IntermediateLine::decode(raw) {
        Ok(line) => Some(line),
        Err(e) => {
            debug!(error = %e, line = raw, "skipping malformed intermediate line");
            None
        }
    }
}

/// Counters for one reduction pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReduceStats {
    /// Non-blank lines read.
    pub read: u64,
    /// Lines that failed to decode.
    pub skipped: u64,
    /// Aggregate records written.
    pub groups: u64,
}

/// Reduce an already sorted stream of encoded lines into `writer`.
pub fn reduce_lines<I>(lines: I, mut writer: impl Write) -> io::Result<ReduceStats>
where
    I: IntoIterator<Item = io::Result<String>>,
{
    let mut reducer = Reducer::new();
    let mut stats = ReduceStats::default();

    for line in lines {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        stats.read += 1;

        let Some(decoded) = decode(&line) else {
            stats.skipped += 1;
            continue;
        };
        if let Some(record) = reducer.push(decoded) {
            writeln!(writer, "{}", record.encode())?;
            stats.groups += 1;
        }
    }

    if let Some(record) = reducer.finish() {
        writeln!(writer, "{}", record.encode())?;
        stats.groups += 1;
    }
    writer.flush()?;

    info!(
        read = stats.read,
        skipped = stats.skipped,
        groups = stats.groups,
        "reduction finished"
    );
    Ok(stats)
}

/// Reduce the sorted lines of `reader` into `writer`.
pub fn reduce_stream(reader: impl BufRead, writer: impl Write) -> io::Result<ReduceStats> {
    reduce_lines(reader.lines(), writer)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Feed one encoded line, skipping it like the stream loop does.
    fn push_raw(reducer: &mut Reducer, raw: &str) -> Option<AggregateRecord> {
        decode(raw).and_then(|line| reducer.push(line))
    }

    fn reduce_all(input: &str) -> Vec<String> {
        let mut out = Vec::new();
        reduce_stream(input.as_bytes(), &mut out).unwrap();
        String::from_utf8(out)
            .unwrap()
            .lines()
            .map(String::from)
            .collect()
    }

    #[test]
    fn groups_contiguous_lines() {
        let output = reduce_all("Ferry1|Mono\tD1|1|0\nFerry1|Mono\tD1|0|1\nFerry1|Mono\tD2|0|1\n");
        assert_eq!(output, ["Ferry1\tMono\t2\t2\t1"]);
    }

    #[test]
    fn flushes_on_key_change_and_at_end() {
        let output = reduce_all(concat!(
            "Ferry1|Mono\tD1|1|0\n",
            "Ferry1|Mono\tD2|0|1\n",
            "Ferry2|Ketch\tD9|0|1\n",
        ));
        assert_eq!(output, ["Ferry1\tMono\t2\t1\t1", "Ferry2\tKetch\t1\t1\t0"]);
    }

    #[test]
    fn trailing_group_is_not_lost() {
        let mut reducer = Reducer::new();
        assert!(push_raw(&mut reducer, "Ferry1|Mono\tD1|0|1").is_none());
        assert!(push_raw(&mut reducer, "Ferry1|Mono\tD1|0|1").is_none());

        let last = reducer.finish().unwrap();
        assert_eq!(last.encode(), "Ferry1\tMono\t1\t2\t0");
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(reduce_all("").is_empty());
        assert!(Reducer::new().finish().is_none());
    }

    #[test]
    fn malformed_lines_do_not_change_the_result() {
        let clean = "Ferry1|Mono\tD1|1|0\nFerry1|Mono\tD1|0|1\nFerry1|Mono\tD2|0|1\n";
        let noisy = concat!(
            "Ferry1|Mono\tD1|1|0\n",
            "garbage\n",
            "Ferry1|Mono\tD1|x|1\n",
            "\n",
            "Ferry1|Mono\tD1|0|1\n",
            "Ferry1|Mono\tD1|0\n",
            "Ferry1|Mono\tD2|0|1\n",
            "Ferry1|Mono\tD2|0|1\textra\n",
        );
        assert_eq!(reduce_all(noisy), reduce_all(clean));
    }

    #[test]
    fn malformed_line_between_groups_keeps_group_open() {
        let mut reducer = Reducer::new();
        push_raw(&mut reducer, "Ferry1|Mono\tD1|0|1");
        assert!(push_raw(&mut reducer, "Ferry2|Mono").is_none());
        assert!(push_raw(&mut reducer, "Ferry1|Mono\tD2|1|0").is_none());
        assert_eq!(reducer.finish().unwrap().encode(), "Ferry1\tMono\t2\t1\t1");
    }

    #[test]
    fn non_contiguous_key_yields_separate_records() {
        let output = reduce_all(concat!(
            "Ferry1|Mono\tD1|0|1\n",
            "Ferry2|Mono\tD1|0|1\n",
            "Ferry1|Mono\tD2|1|0\n",
        ));
        assert_eq!(
            output,
            [
                "Ferry1\tMono\t1\t1\t0",
                "Ferry2\tMono\t1\t1\t0",
                "Ferry1\tMono\t1\t0\t1",
            ]
        );
    }

    #[test]
    fn escaped_names_round_trip_to_output() {
        let output = reduce_all("Sea\\|Wolf|Mono\tD1|0|1\n");
        assert_eq!(output, ["Sea\\|Wolf\tMono\t1\t1\t0"]);
    }

    #[test]
    fn surrounding_whitespace_is_part_of_the_key() {
        let output = reduce_all(concat!(
            " Ferry1|Mono\tD1|0|1\n",
            "Ferry1|Mono\tD2|0|1\r\n",
            "Ferry1|Mono \tD3|0|1\n",
        ));
        assert_eq!(
            output,
            [
                " Ferry1\tMono\t1\t1\t0",
                "Ferry1\tMono\t1\t1\t0",
                "Ferry1\tMono \t1\t1\t0",
            ]
        );
    }

    #[test]
    fn stats_count_reads_skips_and_groups() {
        let mut out = Vec::new();
        let stats = reduce_stream(
            "a|b\tD1|0|1\nbad\n\na|c\tD1|1|0\n".as_bytes(),
            &mut out,
        )
        .unwrap();
        assert_eq!(
            stats,
            ReduceStats {
                read: 3,
                skipped: 1,
                groups: 2
            }
        );
    }

    #[test]
    fn accumulator_counts_distinct_departures() {
        let key = GroupKey::new("Ferry1", "Mono");
        let mut acc =
            GroupAccumulator::seeded(IntermediateLine::person(key.clone(), "D1".into(), true));
        acc.add(IntermediateLine::person(key.clone(), "D1".into(), false));
        acc.add(IntermediateLine::person(key.clone(), "D2".into(), false));

        let record = acc.finish(key);
        assert_eq!(
            (record.trips, record.passengers, record.crew),
            (2, 2, 1)
        );
    }
}
