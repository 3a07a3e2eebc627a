//! Aggregate records: one row per (vessel, rig) group.
//!
//! ```text
//! <vessel>\t<rig>\t<trips>\t<passengers>\t<crew>
//! ```

use serde::Serialize;

use crate::codec::{self, FIELD_SEP};

use super::Result;
use super::line::{exactly, parse_count};

/// Totals for one (vessel, rig) group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateRecord {
    pub vessel: String,
    pub rig: String,
    /// Number of distinct departures.
    pub trips: u64,
    pub passengers: u64,
    pub crew: u64,
}

impl AggregateRecord {
    pub fn total(&self) -> u64 {
        self.passengers + self.crew
    }

    pub fn encode(&self) -> String {
        let trips = self.trips.to_string();
        let passengers = self.passengers.to_string();
        let crew = self.crew.to_string();
        codec::join(
            &[&self.vessel, &self.rig, &trips, &passengers, &crew],
            FIELD_SEP,
        )
    }

    pub fn decode(line: &str) -> Result<Self> {
        let [vessel, rig, trips, passengers, crew] = exactly(codec::split_fields(line, FIELD_SEP)?)?;

        Ok(Self {
            vessel,
            rig,
            trips: parse_count(&trips)?,
            passengers: parse_count(&passengers)?,
            crew: parse_count(&crew)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::model::LineError;

    fn ferry() -> AggregateRecord {
        AggregateRecord {
            vessel: "Ferry1".into(),
            rig: "Mono".into(),
            trips: 2,
            passengers: 2,
            crew: 1,
        }
    }

    #[test]
    fn encodes_five_tab_separated_columns() {
        assert_eq!(ferry().encode(), "Ferry1\tMono\t2\t2\t1");
    }

    #[test]
    fn decodes_five_tab_separated_columns() {
        assert_eq!(AggregateRecord::decode("Ferry1\tMono\t2\t2\t1").unwrap(), ferry());
    }

    #[test]
    fn total_is_passengers_plus_crew() {
        assert_eq!(ferry().total(), 3);
    }

    #[test]
    fn short_rows_are_rejected() {
        assert!(matches!(
            AggregateRecord::decode("Ferry1\tMono\t2"),
            Err(LineError::FieldCount { expected: 5, found: 3 })
        ));
    }

    #[test]
    fn non_numeric_counts_are_rejected() {
        assert!(matches!(
            AggregateRecord::decode("Vessel\tRig\tTrips\tPassengers\tCrew"),
            Err(LineError::Count(_))
        ));
    }
}
