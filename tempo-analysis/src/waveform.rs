//! Decoded audio handed to the detector
//!
//! Decoding lives outside this crate; anything that can produce mono
//! samples at a requested rate implements [`AudioSource`].

use std::convert::Infallible;

/// Mono audio samples (f32, normalized to -1.0 to 1.0)
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Duration in seconds
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Provider of decoded mono audio
///
/// Called at most once per detector. Errors are surfaced to the caller
/// unchanged.
pub trait AudioSource {
    type Error;

    /// Produce mono samples at `sample_rate`
    fn load(&mut self, sample_rate: u32) -> Result<Waveform, Self::Error>;
}

/// An in-memory waveform is its own source
///
/// The waveform is taken as is; callers are responsible for matching the
/// detector's sample rate.
impl AudioSource for Waveform {
    type Error = Infallible;

    fn load(&mut self, sample_rate: u32) -> Result<Waveform, Infallible> {
        if self.sample_rate != sample_rate {
            tracing::warn!(
                "Waveform at {} Hz analysed as {} Hz",
                self.sample_rate,
                sample_rate
            );
        }
        Ok(Waveform::new(
            std::mem::take(&mut self.samples),
            self.sample_rate,
        ))
    }
}
