//! FFT-based tempo estimation
//!
//! The onset envelope is periodic at the beat rate, so its magnitude
//! spectrum peaks at the beat frequency. The peak is searched only among
//! bins whose frequency falls inside the tempo band.

use rustfft::{num_complex::Complex, FftPlanner};

use crate::config::DetectorConfig;
use crate::error::AnalysisError;
use crate::onset::OnsetEnvelope;
use crate::peak::first_max;

/// Magnitude spectrum of an onset envelope (positive frequencies only)
#[derive(Debug, Clone, Default)]
pub struct EnvelopeSpectrum {
    /// Bin frequencies in Hz
    pub frequencies: Vec<f32>,
    /// Bin magnitudes
    pub magnitudes: Vec<f32>,
}

/// Spectral tempo estimator
pub struct SpectralTempoEstimator {
    config: DetectorConfig,
}

impl SpectralTempoEstimator {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    /// Magnitudes of the first `len / 2` DFT bins with their frequencies
    pub fn spectrum(&self, envelope: &OnsetEnvelope) -> EnvelopeSpectrum {
        let len = envelope.len();
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(len);

        let mut buffer: Vec<Complex<f32>> = envelope
            .as_slice()
            .iter()
            .map(|&v| Complex::new(v, 0.0))
            .collect();
        fft.process(&mut buffer);

        let magnitudes: Vec<f32> = buffer[..len / 2].iter().map(|c| c.norm()).collect();
        let frequencies = (0..magnitudes.len())
            .map(|bin| self.config.bin_frequency(bin, len))
            .collect();

        EnvelopeSpectrum {
            frequencies,
            magnitudes,
        }
    }

    /// Tempo in BPM of the strongest in-band spectral peak
    pub fn estimate(&self, envelope: &OnsetEnvelope) -> Result<f32, AnalysisError> {
        let spectrum = self.spectrum(envelope);
        let band = self.config.band;

        let in_band = spectrum
            .frequencies
            .iter()
            .enumerate()
            .filter(|(_, &hz)| band.contains_hz(hz))
            .map(|(bin, _)| bin);

        let peak = first_max(&spectrum.magnitudes, in_band).ok_or_else(|| {
            AnalysisError::DegenerateInput(format!(
                "no spectral bin of a {}-frame envelope falls in {:.1}-{:.1} BPM",
                envelope.len(),
                band.min_bpm,
                band.max_bpm
            ))
        })?;

        let bpm = self.config.hz_to_bpm(spectrum.frequencies[peak]);
        tracing::debug!(
            "Spectral peak at bin {} ({:.3} Hz) -> {:.2} BPM",
            peak,
            spectrum.frequencies[peak],
            bpm
        );
        Ok(bpm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{bpm_for_period, noise_envelope, period_frames, pulse_envelope};

    fn estimate(values: Vec<f32>) -> Result<f32, AnalysisError> {
        let envelope = OnsetEnvelope::new(values).unwrap();
        SpectralTempoEstimator::new(DetectorConfig::default()).estimate(&envelope)
    }

    #[test]
    fn test_recovers_whole_period_tempi() {
        let config = DetectorConfig::default();
        for period in [12usize, 20, 30, 50, 80] {
            let expected = bpm_for_period(period, &config);
            let bpm = estimate(pulse_envelope(period as f32, period * 20, 2.0)).unwrap();
            assert!(
                (bpm - expected).abs() < 2.0,
                "period {period}: got {bpm}, expected {expected}"
            );
        }
    }

    #[test]
    fn test_recovers_120_bpm() {
        let config = DetectorConfig::default();
        let period = period_frames(120.0, &config);
        let bpm = estimate(pulse_envelope(period, 430, 2.0)).unwrap();
        assert!((bpm - 120.0).abs() < 2.0, "got {bpm}");
    }

    #[test]
    fn test_frequencies_follow_bin_spacing() {
        let config = DetectorConfig::default();
        let envelope = OnsetEnvelope::new(vec![1.0; 100]).unwrap();
        let spectrum = SpectralTempoEstimator::new(config).spectrum(&envelope);

        assert_eq!(spectrum.magnitudes.len(), 50);
        assert_eq!(spectrum.frequencies[0], 0.0);
        assert!((spectrum.frequencies[10] - 10.0 * config.frame_rate() / 100.0).abs() < 1e-4);
    }

    #[test]
    fn test_never_leaves_band() {
        let band = DetectorConfig::default().band;
        for seed in 1..20 {
            let bpm = estimate(noise_envelope(300 + seed as usize * 37, seed)).unwrap();
            assert!(band.contains(bpm), "seed {seed}: {bpm} out of band");
        }
    }

    #[test]
    fn test_degenerate_lengths() {
        // Only the DC bin
        assert!(matches!(
            estimate(vec![1.0, 0.0]),
            Err(AnalysisError::DegenerateInput(_))
        ));
        // Bin 1 of a 5-frame envelope is ~8.6 Hz, above the band
        assert!(matches!(
            estimate(vec![1.0, 0.0, 0.0, 0.0, 0.0]),
            Err(AnalysisError::DegenerateInput(_))
        ));
        assert!(estimate(vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]).is_ok());
    }
}
