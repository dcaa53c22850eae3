//! Onset strength envelope
//!
//! Log-mel spectral flux: the waveform is cut into centered, Hann-windowed
//! frames, mapped onto a mel filterbank, converted to decibels, and the
//! positive frame-to-frame increase is averaged over all mel bands.
//! Kicks and snares produce large positive flux values.

use rustfft::{num_complex::Complex, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

use crate::error::AnalysisError;

/// STFT frame size in samples
pub const FRAME_SIZE: usize = 2048;

/// Number of mel bands the flux is averaged over
pub const MEL_BANDS: usize = 128;

/// Floor applied before taking the logarithm of the power spectrum
const AMIN: f32 = 1e-10;

/// Dynamic range kept below the loudest mel bin, in dB
const TOP_DB: f32 = 80.0;

/// Onset strength curve, one non-negative value per hop
///
/// Always holds at least two frames.
#[derive(Debug, Clone, PartialEq)]
pub struct OnsetEnvelope {
    values: Vec<f32>,
}

impl OnsetEnvelope {
    /// Wrap a precomputed onset curve
    pub fn new(values: Vec<f32>) -> Result<Self, AnalysisError> {
        if values.len() < 2 {
            return Err(AnalysisError::DegenerateInput(format!(
                "onset envelope needs at least 2 frames, got {}",
                values.len()
            )));
        }
        if let Some(pos) = values.iter().position(|v| !v.is_finite() || *v < 0.0) {
            return Err(AnalysisError::DegenerateInput(format!(
                "onset envelope value {} at frame {} is not a non-negative number",
                values[pos], pos
            )));
        }
        Ok(Self { values })
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Always false, an envelope holds at least two frames
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Envelope length in seconds at the given frame rate
    pub fn duration_secs(&self, frame_rate: f32) -> f32 {
        self.values.len() as f32 / frame_rate
    }
}

/// Computes onset envelopes from mono waveforms
pub struct OnsetStrength {
    sample_rate: u32,
    hop_length: usize,
    fft: Arc<dyn rustfft::Fft<f32>>,
    window: Vec<f32>,
    /// `MEL_BANDS` rows of `FRAME_SIZE / 2 + 1` weights
    mel_basis: Vec<Vec<f32>>,
}

impl OnsetStrength {
    /// Create an onset strength analyzer
    pub fn new(sample_rate: u32, hop_length: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(FRAME_SIZE);

        // Periodic Hann window
        let window: Vec<f32> = (0..FRAME_SIZE)
            .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / FRAME_SIZE as f32).cos()))
            .collect();

        Self {
            sample_rate,
            hop_length,
            fft,
            window,
            mel_basis: mel_filterbank(sample_rate, FRAME_SIZE, MEL_BANDS),
        }
    }

    /// Compute the onset envelope of `samples`
    ///
    /// The result has one frame per hop (`1 + samples.len() / hop_length`),
    /// with frame `t` aligned to sample `t * hop_length`.
    pub fn compute(&self, samples: &[f32]) -> Result<OnsetEnvelope, AnalysisError> {
        if self.hop_length == 0 {
            return Err(AnalysisError::InvalidConfig(
                "hop length must be positive".to_string(),
            ));
        }

        let mel_db = self.log_mel_spectrogram(samples);
        let frames = mel_db.len();

        let flux = mel_db.windows(2).map(|pair| {
            let (prev, curr) = (&pair[0], &pair[1]);
            let rectified: f32 = curr
                .iter()
                .zip(prev.iter())
                .map(|(c, p)| (c - p).max(0.0))
                .sum();
            rectified / MEL_BANDS as f32
        });

        // Shift by the difference lag plus the centering offset so the curve
        // lines up with frame starts, then trim back to one value per frame.
        let pad = 1 + FRAME_SIZE / (2 * self.hop_length);
        let values: Vec<f32> = std::iter::repeat(0.0)
            .take(pad)
            .chain(flux)
            .take(frames)
            .collect();

        tracing::debug!(
            "Onset envelope: {} frames from {} samples at {} Hz (hop {})",
            values.len(),
            samples.len(),
            self.sample_rate,
            self.hop_length
        );

        OnsetEnvelope::new(values)
    }

    /// Mel power spectrogram in dB, one row of `MEL_BANDS` values per frame
    fn log_mel_spectrogram(&self, samples: &[f32]) -> Vec<Vec<f32>> {
        // Centered frames: zero padding of half a frame on both sides
        let half = FRAME_SIZE / 2;
        let mut padded = vec![0.0f32; samples.len() + FRAME_SIZE];
        padded[half..half + samples.len()].copy_from_slice(samples);

        let frames = 1 + (padded.len() - FRAME_SIZE) / self.hop_length;
        let mut buffer = vec![Complex::new(0.0f32, 0.0); FRAME_SIZE];
        let mut power = vec![0.0f32; FRAME_SIZE / 2 + 1];
        let mut spectrogram = Vec::with_capacity(frames);

        for frame_idx in 0..frames {
            let start = frame_idx * self.hop_length;
            let frame = &padded[start..start + FRAME_SIZE];

            for ((slot, &s), &w) in buffer.iter_mut().zip(frame).zip(&self.window) {
                *slot = Complex::new(s * w, 0.0);
            }
            self.fft.process(&mut buffer);

            for (p, c) in power.iter_mut().zip(&buffer) {
                *p = c.norm_sqr();
            }

            let mel: Vec<f32> = self
                .mel_basis
                .iter()
                .map(|weights| {
                    let energy: f32 = weights.iter().zip(&power).map(|(w, p)| w * p).sum();
                    10.0 * energy.max(AMIN).log10()
                })
                .collect();
            spectrogram.push(mel);
        }

        let peak = spectrogram
            .iter()
            .flatten()
            .copied()
            .fold(f32::NEG_INFINITY, f32::max);
        let floor = peak - TOP_DB;
        for row in &mut spectrogram {
            for v in row.iter_mut() {
                *v = v.max(floor);
            }
        }

        spectrogram
    }
}

/// Slaney-style mel scale: linear below 1 kHz, logarithmic above
fn hz_to_mel(hz: f32) -> f32 {
    const F_SP: f32 = 200.0 / 3.0;
    const MIN_LOG_HZ: f32 = 1000.0;
    let min_log_mel = MIN_LOG_HZ / F_SP;
    let logstep = 6.4f32.ln() / 27.0;

    if hz >= MIN_LOG_HZ {
        min_log_mel + (hz / MIN_LOG_HZ).ln() / logstep
    } else {
        hz / F_SP
    }
}

fn mel_to_hz(mel: f32) -> f32 {
    const F_SP: f32 = 200.0 / 3.0;
    const MIN_LOG_HZ: f32 = 1000.0;
    let min_log_mel = MIN_LOG_HZ / F_SP;
    let logstep = 6.4f32.ln() / 27.0;

    if mel >= min_log_mel {
        MIN_LOG_HZ * (logstep * (mel - min_log_mel)).exp()
    } else {
        mel * F_SP
    }
}

/// Triangular mel filters spanning 0 Hz to Nyquist, area-normalized
fn mel_filterbank(sample_rate: u32, fft_size: usize, bands: usize) -> Vec<Vec<f32>> {
    let bins = fft_size / 2 + 1;
    let nyquist = sample_rate as f32 / 2.0;

    let fft_freqs: Vec<f32> = (0..bins)
        .map(|k| k as f32 * sample_rate as f32 / fft_size as f32)
        .collect();

    let max_mel = hz_to_mel(nyquist);
    let mel_points: Vec<f32> = (0..bands + 2)
        .map(|i| mel_to_hz(max_mel * i as f32 / (bands + 1) as f32))
        .collect();

    (0..bands)
        .map(|i| {
            let (left, center, right) = (mel_points[i], mel_points[i + 1], mel_points[i + 2]);
            let norm = 2.0 / (right - left);
            fft_freqs
                .iter()
                .map(|&f| {
                    let rising = (f - left) / (center - left);
                    let falling = (right - f) / (right - center);
                    rising.min(falling).max(0.0) * norm
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Short decaying noise bursts every `period` samples
    fn click_track(sample_rate: u32, seconds: f32, period: usize) -> Vec<f32> {
        let len = (sample_rate as f32 * seconds) as usize;
        let mut samples = vec![0.0f32; len];
        let mut state: u32 = 0x1234_5678;
        for start in (0..len).step_by(period) {
            for i in 0..400.min(len - start) {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                let noise = (state >> 8) as f32 / (1u32 << 24) as f32 * 2.0 - 1.0;
                samples[start + i] = noise * (-(i as f32) / 80.0).exp();
            }
        }
        samples
    }

    #[test]
    fn test_envelope_rejects_short_input() {
        assert!(matches!(
            OnsetEnvelope::new(vec![1.0]),
            Err(AnalysisError::DegenerateInput(_))
        ));
        assert!(OnsetEnvelope::new(vec![0.0, 1.0]).is_ok());
    }

    #[test]
    fn test_envelope_rejects_negative_and_nan() {
        assert!(OnsetEnvelope::new(vec![0.0, -0.5, 1.0]).is_err());
        assert!(OnsetEnvelope::new(vec![0.0, f32::NAN, 1.0]).is_err());
    }

    #[test]
    fn test_mel_scale_roundtrip_points() {
        assert!((hz_to_mel(1000.0) - 15.0).abs() < 1e-4);
        assert!((mel_to_hz(15.0) - 1000.0).abs() < 1e-2);
        assert!((mel_to_hz(hz_to_mel(4000.0)) - 4000.0).abs() < 0.5);
    }

    #[test]
    fn test_filterbank_shape() {
        let basis = mel_filterbank(22050, FRAME_SIZE, MEL_BANDS);
        assert_eq!(basis.len(), MEL_BANDS);
        assert!(basis.iter().all(|row| row.len() == FRAME_SIZE / 2 + 1));
        assert!(basis.iter().flatten().all(|w| *w >= 0.0));
    }

    #[test]
    fn test_envelope_length_and_alignment() {
        let onset = OnsetStrength::new(22050, 512);
        let samples = click_track(22050, 4.0, 11025);
        let envelope = onset.compute(&samples).unwrap();

        assert_eq!(envelope.len(), 1 + samples.len() / 512);
        assert!(envelope.as_slice().iter().all(|v| *v >= 0.0));

        // Clicks every 0.5 s land near frames 0, 21.5, 43, ...; the strongest
        // response to the click at sample 11025 must be within a few frames of 21.5.
        let window = &envelope.as_slice()[15..30];
        let peak = window
            .iter()
            .enumerate()
            .fold((0, f32::MIN), |best, (i, &v)| if v > best.1 { (i, v) } else { best })
            .0
            + 15;
        assert!((19..=25).contains(&peak), "peak at frame {peak}");
    }

    #[test]
    fn test_silence_gives_flat_envelope() {
        let onset = OnsetStrength::new(22050, 512);
        let envelope = onset.compute(&vec![0.0; 22050]).unwrap();
        assert!(envelope.as_slice().iter().all(|v| *v == 0.0));

        // One frame per hop plus the centred first frame
        assert_eq!(envelope.len(), 44);
        assert!((envelope.duration_secs(22050.0 / 512.0) - 1.0).abs() < 0.05);
    }

    #[test]
    fn test_too_short_waveform_is_degenerate() {
        let onset = OnsetStrength::new(22050, 512);
        assert!(matches!(
            onset.compute(&[0.0; 100]),
            Err(AnalysisError::DegenerateInput(_))
        ));
    }
}
