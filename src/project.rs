//! Record projection: turn one raw trip record into one intermediate line.
//!
//! Projection is stateless. Every input line is handled on its own, so any
//! number of projectors can run side by side over separate input shards.

use std::io::{self, BufRead, Write};

use tracing::{debug, info};

use crate::model::{GroupKey, IntermediateLine, TripRecord};
use crate::partition::partition_of;

/// Counters for one projection pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectStats {
    /// Non-blank lines read.
    pub read: u64,
    pub emitted: u64,
    /// Lines dropped because they were not a JSON object.
    pub skipped: u64,
}

/// Project one raw line.
///
/// Returns `None` for blank lines and for anything that does not parse as a
/// JSON object.
pub fn project(raw: &str) -> Option<IntermediateLine> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let record = match TripRecord::parse(raw) {
        Ok(record) => record,
        Err(e) => {
            debug!(error = %e, "skipping unparsable record");
            return None;
        }
    };

    Some(IntermediateLine::person(
        GroupKey::new(record.vessel(), record.rig()),
        record.departure(),
        record.is_crew(),
    ))
}

/// Project every line of `reader`, writing one encoded line per record.
pub fn project_stream(reader: impl BufRead, mut writer: impl Write) -> io::Result<ProjectStats> {
    let stats = project_each(reader, |line| writeln!(writer, "{}", line.encode()))?;
    writer.flush()?;
    Ok(stats)
}

/// Project every line of `reader`, routing each encoded line to the writer
/// that owns its key.
///
/// All lines of one key land in the same writer, so each partition can be
/// sorted and reduced independently.
pub fn project_partitioned<W: Write>(
    reader: impl BufRead,
    partitions: &mut [W],
) -> io::Result<ProjectStats> {
    if partitions.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "at least one partition is required",
        ));
    }

    let count = partitions.len();
    let stats = project_each(reader, |line| {
        let encoded = line.encode();
        let target = partition_of(&line.key, count);
        writeln!(partitions[target], "{encoded}")
    })?;

    for writer in partitions.iter_mut() {
        writer.flush()?;
    }
    Ok(stats)
}

/// Drive `emit` with every projected line of `reader`.
pub(crate) fn project_each(
    reader: impl BufRead,
    mut emit: impl FnMut(IntermediateLine) -> io::Result<()>,
) -> io::Result<ProjectStats> {
    let mut stats = ProjectStats::default();

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        stats.read += 1;

        match project(&line) {
            Some(projected) => {
                emit(projected)?;
                stats.emitted += 1;
            }
            None => stats.skipped += 1,
        }
    }

    info!(
        read = stats.read,
        emitted = stats.emitted,
        skipped = stats.skipped,
        "projection finished"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::model::UNKNOWN;

    fn project_all(input: &str) -> (Vec<String>, ProjectStats) {
        let mut out = Vec::new();
        let stats = project_stream(input.as_bytes(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        (text.lines().map(String::from).collect(), stats)
    }

    #[test]
    fn projects_crew_and_passengers() {
        let (lines, stats) = project_all(concat!(
            r#"{"Vessel":"Ferry1","Rig":"Mono","ApproximateDeparture":"D1","Rank":"Mate"}"#,
            "\n",
            r#"{"Vessel":"Ferry1","Rig":"Mono","ApproximateDeparture":"D1"}"#,
            "\n",
        ));

        assert_eq!(lines, ["Ferry1|Mono\tD1|1|0", "Ferry1|Mono\tD1|0|1"]);
        assert_eq!(
            stats,
            ProjectStats {
                read: 2,
                emitted: 2,
                skipped: 0
            }
        );
    }

    #[test]
    fn projection_is_pure() {
        let raw = r#"{"Vessel":"Ferry1","Rig":"Mono","ApproximateDeparture":"D1","Rank":"Cook"}"#;
        assert_eq!(project(raw), project(raw));
    }

    #[test]
    fn flags_are_always_exclusive() {
        let inputs = [
            r#"{"Rank":"Captain"}"#,
            r#"{"Rank":""}"#,
            r#"{"Rank":null}"#,
            r#"{"Rank":0}"#,
            r#"{}"#,
        ];
        for raw in inputs {
            let line = project(raw).unwrap();
            assert_eq!(line.is_crew + line.is_passenger, 1, "{raw}");
        }
    }

    #[test]
    fn missing_vessel_and_rig_group_under_unknown() {
        let line = project(r#"{"ApproximateDeparture":"D9"}"#).unwrap();

        assert_eq!(line.key, GroupKey::new(UNKNOWN, UNKNOWN));
        assert_eq!(line.encode(), "Unknown|Unknown\tD9|0|1");
    }

    #[test]
    fn missing_departure_defaults_to_unknown() {
        let line = project(r#"{"Vessel":"Ferry1","Rig":"Mono"}"#).unwrap();
        assert_eq!(line.departure, UNKNOWN);
    }

    #[test]
    fn malformed_and_blank_lines_are_dropped() {
        let (lines, stats) = project_all(concat!(
            "not json\n",
            "\n",
            "   \n",
            "[\"Ferry1\", \"Mono\"]\n",
            r#"{"Vessel":"Ferry1","Rig":"Mono","ApproximateDeparture":"D1"}"#,
            "\n",
            "{\"Vessel\": \n",
        ));

        assert_eq!(lines, ["Ferry1|Mono\tD1|0|1"]);
        assert_eq!(
            stats,
            ProjectStats {
                read: 4,
                emitted: 1,
                skipped: 3
            }
        );
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        assert!(project("  {\"Vessel\":\"Ferry1\"}\r").is_some());
    }

    #[test]
    fn partitioned_projection_keeps_keys_together() {
        let input = concat!(
            r#"{"Vessel":"A","Rig":"Mono","ApproximateDeparture":"D1"}"#,
            "\n",
            r#"{"Vessel":"B","Rig":"Ketch","ApproximateDeparture":"D1"}"#,
            "\n",
            r#"{"Vessel":"A","Rig":"Mono","ApproximateDeparture":"D2","Rank":"Mate"}"#,
            "\n",
        );

        let mut partitions = vec![Vec::new(), Vec::new(), Vec::new()];
        let stats = project_partitioned(input.as_bytes(), &mut partitions).unwrap();
        assert_eq!(stats.emitted, 3);

        let owners: Vec<usize> = partitions
            .iter()
            .enumerate()
            .filter(|(_, out)| String::from_utf8_lossy(out).contains("A|Mono"))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(owners.len(), 1);

        let owner = String::from_utf8(partitions[owners[0]].clone()).unwrap();
        assert_eq!(owner.matches("A|Mono").count(), 2);
    }

    #[test]
    fn partitioned_projection_needs_a_partition() {
        let mut partitions: Vec<Vec<u8>> = Vec::new();
        let err = project_partitioned("".as_bytes(), &mut partitions).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
