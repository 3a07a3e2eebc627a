//! Intermediate lines: the wire format between projection and reduction.
//!
//! ```text
//! <vessel>|<rig>\t<departure>|<is_crew>|<is_passenger>
//! ```

use crate::codec::{self, FIELD_SEP, PART_SEP};

use super::{LineError, Result};

/// The grouping key: one vessel under one rig type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupKey {
    pub vessel: String,
    pub rig: String,
}

impl GroupKey {
    pub fn new(vessel: impl Into<String>, rig: impl Into<String>) -> Self {
        Self {
            vessel: vessel.into(),
            rig: rig.into(),
        }
    }

    /// The escaped `vessel|rig` form used on the wire.
    pub fn encode(&self) -> String {
        codec::join(&[&self.vessel, &self.rig], PART_SEP)
    }

    fn decode(raw: &str) -> Result<Self> {
        let [vessel, rig] = exactly(codec::split_fields(raw, PART_SEP)?)?;
        Ok(Self { vessel, rig })
    }
}

/// One person on one trip, keyed by vessel and rig.
///
/// Lines built by the projector always have exactly one of `is_crew` and
/// `is_passenger` set to 1. Decoded lines are only required to carry
/// non-negative integers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntermediateLine {
    pub key: GroupKey,
    pub departure: String,
    pub is_crew: u32,
    pub is_passenger: u32,
}

impl IntermediateLine {
    /// A line for a single person: crew if `crew`, otherwise passenger.
    pub fn person(key: GroupKey, departure: String, crew: bool) -> Self {
        let is_crew = u32::from(crew);
        Self {
            key,
            departure,
            is_crew,
            is_passenger: 1 - is_crew,
        }
    }

    pub fn encode(&self) -> String {
        let crew = self.is_crew.to_string();
        let passenger = self.is_passenger.to_string();
        let value = codec::join(&[&self.departure, &crew, &passenger], PART_SEP);
        format!("{}{FIELD_SEP}{value}", self.key.encode())
    }

    pub fn decode(line: &str) -> Result<Self> {
        let [key, value] = exactly(codec::split_raw(line, FIELD_SEP)?)?;
        let key = GroupKey::decode(key)?;
        let [departure, is_crew, is_passenger] = exactly(codec::split_fields(value, PART_SEP)?)?;

        Ok(Self {
            key,
            departure,
            is_crew: parse_count(&is_crew)?,
            is_passenger: parse_count(&is_passenger)?,
        })
    }
}

/// Convert a split result into a fixed number of fields.
pub(super) fn exactly<T, const N: usize>(fields: Vec<T>) -> Result<[T; N]> {
    let found = fields.len();
    fields
        .try_into()
        .map_err(|_| LineError::FieldCount { expected: N, found })
}

pub(super) fn parse_count<T: std::str::FromStr>(raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| LineError::Count(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn person_flags_are_exclusive() {
        let key = GroupKey::new("Ferry1", "Mono");
        let crew = IntermediateLine::person(key.clone(), "D1".into(), true);
        let passenger = IntermediateLine::person(key, "D1".into(), false);

        assert_eq!((crew.is_crew, crew.is_passenger), (1, 0));
        assert_eq!((passenger.is_crew, passenger.is_passenger), (0, 1));
    }

    #[test]
    fn encodes_plain_wire_format() {
        let line = IntermediateLine::person(GroupKey::new("Ferry1", "Mono"), "D1".into(), true);
        assert_eq!(line.encode(), "Ferry1|Mono\tD1|1|0");
    }

    #[test]
    fn decodes_plain_wire_format() {
        let line = IntermediateLine::decode("Ferry1|Mono\tD2|0|1").unwrap();

        assert_eq!(line.key, GroupKey::new("Ferry1", "Mono"));
        assert_eq!(line.departure, "D2");
        assert_eq!((line.is_crew, line.is_passenger), (0, 1));
    }

    #[test]
    fn names_containing_separators_survive() {
        let original =
            IntermediateLine::person(GroupKey::new("Sea|Wolf", "Tab\tRig"), "D|7".into(), false);
        let decoded = IntermediateLine::decode(&original.encode()).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn wrong_field_counts_are_rejected() {
        assert!(matches!(
            IntermediateLine::decode("Ferry1|Mono"),
            Err(LineError::FieldCount { expected: 2, found: 1 })
        ));
        assert!(matches!(
            IntermediateLine::decode("Ferry1|Mono|X\tD1|0|1"),
            Err(LineError::FieldCount { expected: 2, found: 3 })
        ));
        assert!(matches!(
            IntermediateLine::decode("Ferry1|Mono\tD1|0"),
            Err(LineError::FieldCount { expected: 3, found: 2 })
        ));
    }

    #[test]
    fn non_integer_flags_are_rejected() {
        assert!(matches!(
            IntermediateLine::decode("Ferry1|Mono\tD1|yes|0"),
            Err(LineError::Count(_))
        ));
        assert!(matches!(
            IntermediateLine::decode("Ferry1|Mono\tD1|-1|0"),
            Err(LineError::Count(_))
        ));
    }
}
