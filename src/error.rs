use crate::hit::TubeId;
use crate::pmt::ParseError;
use thiserror::Error;

/// Errors caused by an inconsistent detector description or configuration.
///
/// Conditions that only mean "no signal" (no hits, no trigger, zero charge)
/// are never reported as errors.
#[derive(Debug, Error)]
pub enum Error {
    #[error("global trigger threshold must be at least 1")]
    ZeroThreshold,
    #[error("event gate is empty: upper edge {up} ns is not after lower edge {down} ns")]
    EmptyEventGate { down: f64, up: f64 },
    #[error("{name} probability must be within [0, 1], got {value}")]
    InvalidProbability { name: &'static str, value: f64 },
    #[error("dark noise rate must be positive and finite, got {0} kHz")]
    InvalidRate(f64),
    #[error("tube {0} is not part of the detector")]
    UnknownTube(TubeId),
    #[error("PMT type `{0}` is not defined")]
    UnknownPmtType(String),
    #[error("tube {0} is defined more than once")]
    DuplicateTube(TubeId),
    #[error(transparent)]
    Parse(#[from] ParseError),
}
