//! Audio file loading and decoding

use std::path::{Path, PathBuf};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tempo_analysis::{AudioSource, Waveform};
use thiserror::Error;

/// Errors that can occur while loading an audio file
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("No audio track found in file")]
    NoAudioTrack,
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Resample error: {0}")]
    Resample(String),
}

/// Track metadata
#[derive(Debug, Clone, Default)]
pub struct TrackMetadata {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub duration_secs: f64,
    /// Sample rate of the file before resampling
    pub sample_rate: u32,
    pub channels: u16,
}

/// A decoded, mono, resampled audio track
pub struct LoadedTrack {
    /// Mono samples (f32, normalized to -1.0 to 1.0)
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Track metadata
    pub metadata: TrackMetadata,
}

/// Audio file loader using Symphonia
pub struct TrackLoader {
    target_sample_rate: u32,
}

impl Default for TrackLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackLoader {
    /// Create a new track loader with the default 22.05kHz analysis rate
    pub fn new() -> Self {
        Self::with_sample_rate(22050)
    }

    /// Create a new track loader with specific sample rate
    pub fn with_sample_rate(target_sample_rate: u32) -> Self {
        Self { target_sample_rate }
    }

    /// Load and decode an audio file, mixing it down to mono
    pub fn load(&self, path: &Path) -> Result<LoadedTrack, LoadError> {
        let file = std::fs::File::open(path)?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        // Create hint from file extension
        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| LoadError::UnsupportedFormat(e.to_string()))?;

        let mut format = probed.format;

        // Find first audio track
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(LoadError::NoAudioTrack)?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let source_sample_rate = codec_params
            .sample_rate
            .ok_or_else(|| LoadError::Decode("sample rate unknown".to_string()))?;
        let channels = codec_params
            .channels
            .map(|c| c.count() as u16)
            .unwrap_or(1);

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| LoadError::UnsupportedFormat(e.to_string()))?;

        let mut metadata = self.extract_metadata(&mut format, path);
        metadata.sample_rate = source_sample_rate;
        metadata.channels = channels;

        // Decode all packets, averaging channels into one mono stream
        let mut samples: Vec<f32> = Vec::new();
        let mut skipped_packets = 0usize;

        loop {
            let packet = match format.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => return Err(LoadError::Decode(e.to_string())),
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(d) => d,
                Err(SymphoniaError::DecodeError(e)) => {
                    tracing::warn!("Skipping corrupt packet in {}: {}", path.display(), e);
                    skipped_packets += 1;
                    continue;
                }
                Err(e) => return Err(LoadError::Decode(e.to_string())),
            };

            let spec = *decoded.spec();
            let packet_channels = spec.channels.count().max(1);
            let duration = decoded.capacity() as u64;

            let mut sample_buf = SampleBuffer::<f32>::new(duration, spec);
            sample_buf.copy_interleaved_ref(decoded);
            samples.extend(
                sample_buf
                    .samples()
                    .chunks(packet_channels)
                    .map(|frame| frame.iter().sum::<f32>() / packet_channels as f32),
            );
        }

        metadata.duration_secs = samples.len() as f64 / source_sample_rate as f64;

        let (samples, final_sample_rate) = if source_sample_rate != self.target_sample_rate {
            (
                self.resample(&samples, source_sample_rate)?,
                self.target_sample_rate,
            )
        } else {
            (samples, source_sample_rate)
        };

        tracing::info!(
            "Loaded {} ({:.1}s, {} Hz, {} ch) -> {} mono samples at {} Hz{}",
            path.display(),
            metadata.duration_secs,
            source_sample_rate,
            channels,
            samples.len(),
            final_sample_rate,
            if skipped_packets > 0 {
                format!(", {} packets skipped", skipped_packets)
            } else {
                String::new()
            }
        );

        Ok(LoadedTrack {
            samples,
            sample_rate: final_sample_rate,
            metadata,
        })
    }

    /// Resample mono audio to the target sample rate
    fn resample(&self, samples: &[f32], source_rate: u32) -> Result<Vec<f32>, LoadError> {
        use rubato::{FftFixedInOut, Resampler};

        let mut resampler = FftFixedInOut::<f32>::new(
            source_rate as usize,
            self.target_sample_rate as usize,
            1024,
            1,
        )
        .map_err(|e| LoadError::Resample(e.to_string()))?;

        let chunk_size = resampler.input_frames_next();
        let expected_len =
            (samples.len() as u64 * self.target_sample_rate as u64 / source_rate as u64) as usize;
        let mut output: Vec<f32> = Vec::with_capacity(expected_len + chunk_size);

        let mut pos = 0;
        while pos + chunk_size <= samples.len() {
            let resampled = resampler
                .process(&[&samples[pos..pos + chunk_size]], None)
                .map_err(|e| LoadError::Resample(e.to_string()))?;
            output.extend_from_slice(&resampled[0]);
            pos += chunk_size;
        }

        // Handle remaining samples (pad with zeros)
        if pos < samples.len() {
            let mut padded = samples[pos..].to_vec();
            padded.resize(chunk_size, 0.0);
            let resampled = resampler
                .process(&[padded.as_slice()], None)
                .map_err(|e| LoadError::Resample(e.to_string()))?;
            output.extend_from_slice(&resampled[0]);
        }

        // The FFT resampler delays its output; drop the zero-padded tail so the
        // length matches the source duration.
        output.truncate(expected_len);
        Ok(output)
    }

    /// Extract metadata from format reader
    fn extract_metadata(
        &self,
        format: &mut Box<dyn symphonia::core::formats::FormatReader>,
        path: &Path,
    ) -> TrackMetadata {
        let mut metadata = TrackMetadata {
            title: path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("Unknown")
                .to_string(),
            artist: "Unknown".to_string(),
            album: "Unknown".to_string(),
            ..Default::default()
        };

        if let Some(meta) = format.metadata().current() {
            for tag in meta.tags() {
                match tag.std_key {
                    Some(symphonia::core::meta::StandardTagKey::TrackTitle) => {
                        metadata.title = tag.value.to_string();
                    }
                    Some(symphonia::core::meta::StandardTagKey::Artist) => {
                        metadata.artist = tag.value.to_string();
                    }
                    Some(symphonia::core::meta::StandardTagKey::Album) => {
                        metadata.album = tag.value.to_string();
                    }
                    _ => {}
                }
            }
        }

        metadata
    }
}

/// An audio file on disk, decoded on first use
pub struct FileSource {
    path: PathBuf,
    metadata: Option<TrackMetadata>,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            metadata: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Metadata of the file, available once it has been loaded
    pub fn metadata(&self) -> Option<&TrackMetadata> {
        self.metadata.as_ref()
    }
}

impl AudioSource for FileSource {
    type Error = LoadError;

    fn load(&mut self, sample_rate: u32) -> Result<Waveform, LoadError> {
        let track = TrackLoader::with_sample_rate(sample_rate).load(&self.path)?;
        self.metadata = Some(track.metadata);
        Ok(Waveform::new(track.samples, track.sample_rate))
    }
}
