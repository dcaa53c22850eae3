//! Tempo analysis
//!
//! Estimates the tempo of a waveform from its onset strength envelope.
//! Two independent estimates are made, one from the envelope's magnitude
//! spectrum and one from its autocorrelation, and fused into a single BPM.

mod config;
mod detector;
mod error;
mod fusion;
mod onset;
mod peak;
mod periodicity;
mod spectral;
mod waveform;

#[cfg(test)]
mod test_utils;

pub use config::{DetectorConfig, TempoBand};
pub use detector::{estimate_tempo, DetectorState, TempoDetector, TempoDiagnostics};
pub use error::{AnalysisError, DetectError};
pub use fusion::fuse;
pub use onset::{OnsetEnvelope, OnsetStrength, FRAME_SIZE, MEL_BANDS};
pub use periodicity::PeriodicityTempoEstimator;
pub use spectral::{EnvelopeSpectrum, SpectralTempoEstimator};
pub use waveform::{AudioSource, Waveform};
