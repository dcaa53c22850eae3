//! Error types for tempo analysis

use thiserror::Error;

/// Errors raised by the tempo estimators and the envelope provider
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// The input is too short (or otherwise malformed) to yield an in-band tempo
    #[error("Degenerate input: {0}")]
    DegenerateInput(String),
    /// Detector parameters are out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Errors surfaced by [`crate::TempoDetector`]
///
/// Loader errors are passed through unchanged in `Source`.
#[derive(Error, Debug)]
pub enum DetectError<E> {
    #[error(transparent)]
    Source(E),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}
