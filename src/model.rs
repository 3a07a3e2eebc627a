//! Data model for the vessel study.
//!
//! Raw trip records come in, intermediate lines flow between the
//! projection and reduction stages, and aggregate records come out.

mod aggregate;
mod line;
mod record;

pub use aggregate::AggregateRecord;
pub use line::{GroupKey, IntermediateLine};
pub use record::{TripRecord, UNKNOWN};

use crate::codec::CodecError;

/// Why an encoded line could not be decoded.
#[derive(Debug, thiserror::Error)]
pub enum LineError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("not a non-negative integer: {0:?}")]
    Count(String),
}

pub type Result<T> = core::result::Result<T, LineError>;
