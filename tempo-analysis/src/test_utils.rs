//! Synthetic onset envelopes for tests

use crate::config::DetectorConfig;

/// Gaussian pulses of width `sigma` frames every `period` frames
///
/// The first pulse sits half a period in, so when `len` is a multiple of
/// `period` the train is periodic over the whole envelope.
pub fn pulse_envelope(period: f32, len: usize, sigma: f32) -> Vec<f32> {
    let mut values = vec![0.0f32; len];
    let mut center = period / 2.0;
    while center < len as f32 {
        for (i, v) in values.iter_mut().enumerate() {
            let d = i as f32 - center;
            *v += (-(d * d) / (2.0 * sigma * sigma)).exp();
        }
        center += period;
    }
    values
}

/// Unit impulses every `period` frames, rounded to the nearest frame
pub fn impulse_envelope(period: f32, len: usize) -> Vec<f32> {
    let mut values = vec![0.0f32; len];
    let mut k = 0.0f32;
    loop {
        let idx = (k * period).round() as usize;
        if idx >= len {
            break;
        }
        values[idx] = 1.0;
        k += 1.0;
    }
    values
}

/// Envelope period in frames for a tempo at the given configuration
pub fn period_frames(bpm: f32, config: &DetectorConfig) -> f32 {
    60.0 * config.frame_rate() / bpm
}

/// Tempo whose period is exactly `frames` envelope frames
pub fn bpm_for_period(frames: usize, config: &DetectorConfig) -> f32 {
    config.lag_to_bpm(frames)
}

/// Deterministic non-negative noise
pub fn noise_envelope(len: usize, seed: u32) -> Vec<f32> {
    let mut state = seed;
    (0..len)
        .map(|_| {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            (state >> 8) as f32 / (1u32 << 24) as f32
        })
        .collect()
}
