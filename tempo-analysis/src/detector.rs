//! Tempo detection facade
//!
//! Drives a detector through `NeedsAudio -> NeedsEnvelope -> Ready`:
//! audio is loaded from an [`AudioSource`], turned into an onset envelope,
//! and both estimators run on that envelope before their candidates are
//! fused. Each stage runs at most once per detector.

use std::thread;

use crate::config::DetectorConfig;
use crate::error::{AnalysisError, DetectError};
use crate::fusion::fuse;
use crate::onset::{OnsetEnvelope, OnsetStrength};
use crate::periodicity::PeriodicityTempoEstimator;
use crate::spectral::SpectralTempoEstimator;
use crate::waveform::{AudioSource, Waveform};

/// Lifecycle stage of a [`TempoDetector`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    NeedsAudio,
    NeedsEnvelope,
    Ready,
}

enum Stage {
    NeedsAudio,
    NeedsEnvelope {
        waveform: Waveform,
    },
    Ready {
        waveform: Waveform,
        envelope: OnsetEnvelope,
    },
}

/// Intermediate signals for plotting
#[derive(Debug, Clone)]
pub struct TempoDiagnostics {
    /// Onset envelope frames per second
    pub frame_rate: f32,
    pub envelope: Vec<f32>,
    /// Spectrum bin frequencies in Hz
    pub frequencies: Vec<f32>,
    pub magnitudes: Vec<f32>,
    /// Autocorrelation indexed by lag in frames
    pub autocorrelation: Vec<f32>,
}

/// Tempo detector over one audio source
pub struct TempoDetector<S> {
    source: S,
    config: DetectorConfig,
    onset: OnsetStrength,
    stage: Stage,
}

impl<S: AudioSource> TempoDetector<S> {
    /// Create a detector; nothing is loaded until it is needed
    pub fn new(source: S, config: DetectorConfig) -> Result<Self, AnalysisError> {
        config.validate()?;
        Ok(Self {
            source,
            config,
            onset: OnsetStrength::new(config.sample_rate, config.hop_length),
            stage: Stage::NeedsAudio,
        })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn state(&self) -> DetectorState {
        match self.stage {
            Stage::NeedsAudio => DetectorState::NeedsAudio,
            Stage::NeedsEnvelope { .. } => DetectorState::NeedsEnvelope,
            Stage::Ready { .. } => DetectorState::Ready,
        }
    }

    /// The loaded waveform, once audio has been loaded
    pub fn waveform(&self) -> Option<&Waveform> {
        match &self.stage {
            Stage::NeedsAudio => None,
            Stage::NeedsEnvelope { waveform } | Stage::Ready { waveform, .. } => Some(waveform),
        }
    }

    /// The onset envelope, once computed
    pub fn envelope(&self) -> Option<&OnsetEnvelope> {
        match &self.stage {
            Stage::Ready { envelope, .. } => Some(envelope),
            _ => None,
        }
    }

    /// Load audio from the source if that has not happened yet
    pub fn load_audio(&mut self) -> Result<(), DetectError<S::Error>> {
        if let Stage::NeedsAudio = self.stage {
            let waveform = self
                .source
                .load(self.config.sample_rate)
                .map_err(DetectError::Source)?;
            tracing::debug!(
                "Loaded {:.2}s of audio ({} samples)",
                waveform.duration_secs(),
                waveform.samples.len()
            );
            self.stage = Stage::NeedsEnvelope { waveform };
        }
        Ok(())
    }

    /// Compute the onset envelope, loading audio first if needed
    pub fn compute_onset_envelope(&mut self) -> Result<(), DetectError<S::Error>> {
        self.load_audio()?;
        if let Stage::NeedsEnvelope { waveform } = &self.stage {
            let envelope = self.onset.compute(&waveform.samples)?;
            tracing::debug!(
                "Onset envelope: {} frames ({:.2}s)",
                envelope.len(),
                envelope.duration_secs(self.config.frame_rate())
            );
            if let Stage::NeedsEnvelope { waveform } =
                std::mem::replace(&mut self.stage, Stage::NeedsAudio)
            {
                self.stage = Stage::Ready { waveform, envelope };
            }
        }
        Ok(())
    }

    /// Estimate the tempo in BPM
    ///
    /// Loads audio and computes the envelope on first use; later calls reuse
    /// them and return the same value.
    pub fn detect_tempo(&mut self) -> Result<f32, DetectError<S::Error>> {
        let config = self.config;
        let envelope = self.ready_envelope()?;
        Ok(estimate_tempo(envelope, &config)?)
    }

    /// Envelope, spectrum and autocorrelation used by the estimators
    pub fn diagnostics(&mut self) -> Result<TempoDiagnostics, DetectError<S::Error>> {
        let config = self.config;
        let envelope = self.ready_envelope()?;
        let spectrum = SpectralTempoEstimator::new(config).spectrum(envelope);
        let autocorrelation = PeriodicityTempoEstimator::new(config).autocorrelation(envelope);

        Ok(TempoDiagnostics {
            frame_rate: config.frame_rate(),
            envelope: envelope.as_slice().to_vec(),
            frequencies: spectrum.frequencies,
            magnitudes: spectrum.magnitudes,
            autocorrelation,
        })
    }

    fn ready_envelope(&mut self) -> Result<&OnsetEnvelope, DetectError<S::Error>> {
        self.compute_onset_envelope()?;
        match &self.stage {
            Stage::Ready { envelope, .. } => Ok(envelope),
            _ => unreachable!("compute_onset_envelope leaves the detector ready"),
        }
    }
}

/// Estimate the tempo of a precomputed onset envelope
///
/// Both estimators read the envelope concurrently; their candidates are
/// fused once both have finished.
pub fn estimate_tempo(
    envelope: &OnsetEnvelope,
    config: &DetectorConfig,
) -> Result<f32, AnalysisError> {
    config.validate()?;
    let spectral = SpectralTempoEstimator::new(*config);
    let periodicity = PeriodicityTempoEstimator::new(*config);

    let (spectral_bpm, periodicity_bpm) = thread::scope(|scope| {
        let handle = scope.spawn(|| spectral.estimate(envelope));
        let periodicity_bpm = periodicity.estimate(envelope);
        let spectral_bpm = handle
            .join()
            .unwrap_or_else(|payload| std::panic::resume_unwind(payload));
        (spectral_bpm, periodicity_bpm)
    });
    let (spectral_bpm, periodicity_bpm) = (spectral_bpm?, periodicity_bpm?);

    let bpm = fuse(spectral_bpm, periodicity_bpm, config.agreement_threshold);
    tracing::debug!(
        "Tempo candidates: spectral {:.2} BPM, autocorrelation {:.2} BPM -> {:.2} BPM",
        spectral_bpm,
        periodicity_bpm,
        bpm
    );
    Ok(bpm)
}
