//! Summaries over the aggregate table.
//!
//! Three rankings are derived from the reducer's output, each row's total
//! being passengers plus crew:
//!
//! 1. vessels by total people,
//! 2. rigs by total people, split into passengers and crew,
//! 3. rigs by the mean, across their rows, of people per trip.
//!
//! Rankings are descending; ties break by name.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::io::{self, BufRead};

use serde::Serialize;
use tracing::debug;

use crate::model::AggregateRecord;

/// One vessel's total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VesselTotal {
    pub vessel: String,
    pub total: u64,
}

/// One rig's passenger and crew totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RigComposition {
    pub rig: String,
    pub passengers: u64,
    pub crew: u64,
    pub total: u64,
}

/// One rig's mean people per trip.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RigAverage {
    pub rig: String,
    pub avg_per_trip: f64,
}

/// The three rankings.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub top_vessels: Vec<VesselTotal>,
    pub rig_composition: Vec<RigComposition>,
    pub avg_per_trip_by_rig: Vec<RigAverage>,
}

impl Report {
    /// Build the report from aggregate records, keeping `limit` rows per ranking.
    pub fn build(records: &[AggregateRecord], limit: usize) -> Self {
        Self {
            top_vessels: top_vessels(records, limit),
            rig_composition: rig_composition(records, limit),
            avg_per_trip_by_rig: avg_per_trip_by_rig(records, limit),
        }
    }
}

/// Read aggregate records, skipping rows that do not decode.
pub fn read_records(reader: impl BufRead) -> io::Result<Vec<AggregateRecord>> {
    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        match AggregateRecord::decode(line) {
            Ok(record) => records.push(record),
            Err(e) => debug!(error = %e, line, "skipping malformed aggregate row"),
        }
    }
    Ok(records)
}

fn top_vessels(records: &[AggregateRecord], limit: usize) -> Vec<VesselTotal> {
    let mut totals: BTreeMap<&str, u64> = BTreeMap::new();
    for record in records {
        *totals.entry(&record.vessel).or_default() += record.total();
    }

    let mut ranked: Vec<VesselTotal> = totals
        .into_iter()
        .map(|(vessel, total)| VesselTotal {
            vessel: vessel.to_string(),
            total,
        })
        .collect();
    ranked.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.vessel.cmp(&b.vessel)));
    ranked.truncate(limit);
    ranked
}

fn rig_composition(records: &[AggregateRecord], limit: usize) -> Vec<RigComposition> {
    let mut rigs: BTreeMap<&str, (u64, u64)> = BTreeMap::new();
    for record in records {
        let (passengers, crew) = rigs.entry(&record.rig).or_default();
        *passengers += record.passengers;
        *crew += record.crew;
    }

    let mut ranked: Vec<RigComposition> = rigs
        .into_iter()
        .map(|(rig, (passengers, crew))| RigComposition {
            rig: rig.to_string(),
            passengers,
            crew,
            total: passengers + crew,
        })
        .collect();
    ranked.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.rig.cmp(&b.rig)));
    ranked.truncate(limit);
    ranked
}

fn avg_per_trip_by_rig(records: &[AggregateRecord], limit: usize) -> Vec<RigAverage> {
    // Sum of per-row ratios and row count, per rig.
    let mut rigs: BTreeMap<&str, (f64, u32)> = BTreeMap::new();
    for record in records.iter().filter(|r| r.trips > 0) {
        #[allow(clippy::cast_precision_loss)]
        let ratio = record.total() as f64 / record.trips as f64;
        let (sum, rows) = rigs.entry(&record.rig).or_default();
        *sum += ratio;
        *rows += 1;
    }

    let mut ranked: Vec<RigAverage> = rigs
        .into_iter()
        .map(|(rig, (sum, rows))| RigAverage {
            rig: rig.to_string(),
            avg_per_trip: sum / f64::from(rows),
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.avg_per_trip
            .partial_cmp(&a.avg_per_trip)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.rig.cmp(&b.rig))
    });
    ranked.truncate(limit);
    ranked
}
