//! Autocorrelation-based tempo estimation
//!
//! Autocorrelation finds periodic patterns by correlating the signal with
//! delayed versions of itself. The in-band lag with the highest
//! correlation is taken as the beat period.
//!
//! The correlation is computed with FFT acceleration,
//! `ACF = IFFT(|FFT(signal)|^2)`, zero-padded to avoid circular wrap.

use rustfft::{num_complex::Complex, FftPlanner};

use crate::config::DetectorConfig;
use crate::error::AnalysisError;
use crate::onset::OnsetEnvelope;
use crate::peak::first_max;

/// Periodicity (autocorrelation) tempo estimator
pub struct PeriodicityTempoEstimator {
    config: DetectorConfig,
}

impl PeriodicityTempoEstimator {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    /// Raw autocorrelation `r[k] = sum_t e[t] * e[t + k]`
    ///
    /// Holds `autocorrelation_size()` lags, or fewer when the envelope is
    /// shorter than that.
    pub fn autocorrelation(&self, envelope: &OnsetEnvelope) -> Vec<f32> {
        let signal = envelope.as_slice();
        let n = signal.len();
        let fft_size = (2 * n).next_power_of_two();

        let mut buffer: Vec<Complex<f32>> = signal.iter().map(|&x| Complex::new(x, 0.0)).collect();
        buffer.resize(fft_size, Complex::new(0.0, 0.0));

        let mut planner = FftPlanner::new();
        planner.plan_fft_forward(fft_size).process(&mut buffer);
        for x in &mut buffer {
            *x = Complex::new(x.norm_sqr(), 0.0);
        }
        planner.plan_fft_inverse(fft_size).process(&mut buffer);

        // rustfft leaves the inverse unnormalized
        let scale = fft_size as f32;
        buffer
            .iter()
            .take(n.min(self.config.autocorrelation_size()))
            .map(|c| c.re / scale)
            .collect()
    }

    /// Tempo in BPM of the strongest in-band autocorrelation lag
    pub fn estimate(&self, envelope: &OnsetEnvelope) -> Result<f32, AnalysisError> {
        let acf = self.autocorrelation(envelope);
        let band = self.config.band;

        // Lag 0 implies an infinite tempo and is never a candidate
        let in_band = (1..acf.len()).filter(|&lag| band.contains(self.config.lag_to_bpm(lag)));

        let lag = first_max(&acf, in_band).ok_or_else(|| {
            AnalysisError::DegenerateInput(format!(
                "no autocorrelation lag of a {}-frame envelope falls in {:.1}-{:.1} BPM",
                envelope.len(),
                band.min_bpm,
                band.max_bpm
            ))
        })?;

        let bpm = self.config.lag_to_bpm(lag);
        tracing::debug!("Autocorrelation peak at lag {} -> {:.2} BPM", lag, bpm);
        Ok(bpm)
    }
}
