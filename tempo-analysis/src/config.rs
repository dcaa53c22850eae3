//! Detector parameters
//!
//! Every constant the estimators depend on lives here so that tests and
//! callers can tune them. The frequency band searched by the spectral
//! estimator is always derived from the BPM band.

use crate::error::AnalysisError;

/// Closed range of plausible tempi in BPM
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoBand {
    pub min_bpm: f32,
    pub max_bpm: f32,
}

impl Default for TempoBand {
    fn default() -> Self {
        Self {
            min_bpm: 30.0,
            max_bpm: 300.0,
        }
    }
}

impl TempoBand {
    /// Create a validated band
    pub fn new(min_bpm: f32, max_bpm: f32) -> Result<Self, AnalysisError> {
        let band = Self { min_bpm, max_bpm };
        band.validate()?;
        Ok(band)
    }

    fn validate(&self) -> Result<(), AnalysisError> {
        if !(self.min_bpm.is_finite() && self.max_bpm.is_finite()) {
            return Err(AnalysisError::InvalidConfig(format!(
                "tempo band [{}, {}] is not finite",
                self.min_bpm, self.max_bpm
            )));
        }
        if self.min_bpm <= 0.0 || self.min_bpm >= self.max_bpm {
            return Err(AnalysisError::InvalidConfig(format!(
                "tempo band [{:.1}, {:.1}] BPM must satisfy 0 < min < max",
                self.min_bpm, self.max_bpm
            )));
        }
        Ok(())
    }

    /// Whether `bpm` lies inside the band (bounds included)
    pub fn contains(&self, bpm: f32) -> bool {
        bpm >= self.min_bpm && bpm <= self.max_bpm
    }

    /// Lower bound of the band in Hz (beats per second)
    pub fn min_hz(&self) -> f32 {
        self.min_bpm / 60.0
    }

    /// Upper bound of the band in Hz (beats per second)
    pub fn max_hz(&self) -> f32 {
        self.max_bpm / 60.0
    }

    /// Whether a frequency in Hz lies inside the band (bounds included)
    pub fn contains_hz(&self, hz: f32) -> bool {
        hz >= self.min_hz() && hz <= self.max_hz()
    }
}

/// Tempo detector configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorConfig {
    /// Sample rate the waveform is analysed at, in Hz (default: 22050)
    pub sample_rate: u32,
    /// Samples between consecutive onset envelope frames (default: 512)
    pub hop_length: usize,
    /// Tempo range searched by both estimators (default: 30-300 BPM)
    pub band: TempoBand,
    /// Maximum disagreement in BPM for which the two estimates are averaged (default: 5.0)
    pub agreement_threshold: f32,
    /// Envelope time covered by the autocorrelation lags, in seconds (default: 1.0)
    ///
    /// Lags beyond this window are never searched, so with the default the
    /// autocorrelation estimate cannot go below ~61.5 BPM even though the
    /// band reaches 30 BPM. Raise it to about 2.1 s to cover the whole band.
    pub autocorrelation_secs: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            sample_rate: 22050,
            hop_length: 512,
            band: TempoBand::default(),
            agreement_threshold: 5.0,
            autocorrelation_secs: 1.0,
        }
    }
}

impl DetectorConfig {
    /// Check all parameters, returning the first violation found
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.sample_rate == 0 {
            return Err(AnalysisError::InvalidConfig(
                "sample rate must be positive".to_string(),
            ));
        }
        if self.hop_length == 0 {
            return Err(AnalysisError::InvalidConfig(
                "hop length must be positive".to_string(),
            ));
        }
        self.band.validate()?;
        if !self.agreement_threshold.is_finite() || self.agreement_threshold < 0.0 {
            return Err(AnalysisError::InvalidConfig(format!(
                "agreement threshold {} must be a non-negative number",
                self.agreement_threshold
            )));
        }
        if !self.autocorrelation_secs.is_finite() || self.autocorrelation_secs <= 0.0 {
            return Err(AnalysisError::InvalidConfig(format!(
                "autocorrelation window {} s must be positive",
                self.autocorrelation_secs
            )));
        }

        // The fastest tempo must still span at least one envelope frame,
        // otherwise lag 0 would be the only lag able to represent it.
        let min_lag = 60.0 * self.frame_rate() / self.band.max_bpm;
        if min_lag < 1.0 {
            return Err(AnalysisError::InvalidConfig(format!(
                "max tempo {:.1} BPM exceeds the envelope resolution ({:.1} BPM at lag 1)",
                self.band.max_bpm,
                self.lag_to_bpm(1)
            )));
        }
        Ok(())
    }

    /// Onset envelope frames per second
    pub fn frame_rate(&self) -> f32 {
        self.sample_rate as f32 / self.hop_length as f32
    }

    /// Frequency in Hz of DFT bin `bin` for an envelope of `len` frames
    pub fn bin_frequency(&self, bin: usize, len: usize) -> f32 {
        bin as f32 * self.frame_rate() / len as f32
    }

    /// Tempo implied by a periodicity of `hz` beats per second
    pub fn hz_to_bpm(&self, hz: f32) -> f32 {
        hz * 60.0
    }

    /// Tempo implied by an autocorrelation lag of `lag` envelope frames
    pub fn lag_to_bpm(&self, lag: usize) -> f32 {
        60.0 / (lag as f32 * self.hop_length as f32 / self.sample_rate as f32)
    }

    /// Number of autocorrelation lags computed, lag 0 included
    ///
    /// 43 with the defaults (lags 0-42).
    pub fn autocorrelation_size(&self) -> usize {
        (self.autocorrelation_secs * self.frame_rate()).floor() as usize
    }

    /// Smallest envelope length from which on both estimators always have
    /// at least one in-band bin or lag to choose from
    ///
    /// Every envelope of this length or longer yields a tempo. With the
    /// defaults this is 10 frames (about 0.23 s of audio).
    pub fn min_envelope_len(&self) -> Result<usize, AnalysisError> {
        self.validate()?;

        let first_lag = (1..self.autocorrelation_size())
            .find(|&lag| self.band.contains(self.lag_to_bpm(lag)))
            .ok_or_else(|| {
                AnalysisError::InvalidConfig("no autocorrelation lag falls in the band".to_string())
            })?;

        if self.band.min_hz() >= self.frame_rate() / 2.0 {
            return Err(AnalysisError::InvalidConfig(format!(
                "min tempo {:.1} BPM is above the envelope Nyquist rate",
                self.band.min_bpm
            )));
        }

        // A lag `k` is only available once the envelope has more than `k` frames.
        // Shorter lengths may still miss the band between two bins, so scan
        // until the bin spacing alone guarantees a bin and remember the last miss.
        let start = (first_lag + 1).max(2);
        let mut min_len = start;
        let mut len = start;
        loop {
            if !self.has_spectral_bin(len) {
                min_len = len + 1;
            }
            if self.spectral_bin_guaranteed(len) {
                return Ok(min_len);
            }
            len += 1;
        }
    }

    fn has_spectral_bin(&self, len: usize) -> bool {
        let first = (self.band.min_hz() * len as f32 / self.frame_rate()).ceil() as usize;
        // Check the neighbours too, rounding can push the boundary bin either way.
        (first.saturating_sub(1)..=first + 1)
            .filter(|&bin| bin < len / 2)
            .any(|bin| self.band.contains_hz(self.bin_frequency(bin, len)))
    }

    /// Whether every length from `len` on has an in-band bin
    ///
    /// The first bin at or above `min_hz` lies less than one spacing above
    /// it, so it is in band when the spacing is below the band width and it
    /// stays clear of the last bin kept (`fr/2 - spacing/2` for odd lengths).
    /// Both conditions only get easier as `len` grows.
    fn spectral_bin_guaranteed(&self, len: usize) -> bool {
        let spacing = self.frame_rate() / len as f32;
        let width = self.band.max_hz() - self.band.min_hz();
        spacing < width && self.band.min_hz() + 1.5 * spacing < self.frame_rate() / 2.0
    }
}
