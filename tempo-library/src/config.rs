//! Detector settings persisted between runs
//!
//! Stored as simple `key=value` lines. Any key left out keeps the built-in
//! default of [`DetectorConfig`].

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempo_analysis::{AnalysisError, DetectorConfig, TempoBand};

/// User overrides for the detector configuration
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Config {
    pub sample_rate: Option<u32>,
    pub hop_length: Option<usize>,
    pub min_bpm: Option<f32>,
    pub max_bpm: Option<f32>,
    pub agreement_threshold: Option<f32>,
    pub autocorrelation_secs: Option<f32>,
}

impl Config {
    /// Load config from the default location
    ///
    /// Returns default config if file doesn't exist or can't be read.
    pub fn load() -> Self {
        let path = Self::config_path();
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                tracing::warn!("Failed to read {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Load config from a specific path
    pub fn load_from(path: &Path) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(Self::parse(&content))
    }

    /// Save config to the default location
    pub fn save(&self) -> io::Result<PathBuf> {
        let path = Self::config_path();
        self.save_to(&path)?;
        Ok(path)
    }

    /// Save config to a specific path
    pub fn save_to(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.serialize())
    }

    /// Get the default config file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tempo")
            .join("config.txt")
    }

    /// Capture every field of a detector configuration
    pub fn from_detector(config: &DetectorConfig) -> Self {
        Self {
            sample_rate: Some(config.sample_rate),
            hop_length: Some(config.hop_length),
            min_bpm: Some(config.band.min_bpm),
            max_bpm: Some(config.band.max_bpm),
            agreement_threshold: Some(config.agreement_threshold),
            autocorrelation_secs: Some(config.autocorrelation_secs),
        }
    }

    /// Fill unset fields from `other`
    pub fn or(self, other: Config) -> Self {
        Self {
            sample_rate: self.sample_rate.or(other.sample_rate),
            hop_length: self.hop_length.or(other.hop_length),
            min_bpm: self.min_bpm.or(other.min_bpm),
            max_bpm: self.max_bpm.or(other.max_bpm),
            agreement_threshold: self.agreement_threshold.or(other.agreement_threshold),
            autocorrelation_secs: self.autocorrelation_secs.or(other.autocorrelation_secs),
        }
    }

    /// Apply the overrides on top of the defaults and validate the result
    pub fn to_detector_config(&self) -> Result<DetectorConfig, AnalysisError> {
        let defaults = DetectorConfig::default();
        let config = DetectorConfig {
            sample_rate: self.sample_rate.unwrap_or(defaults.sample_rate),
            hop_length: self.hop_length.unwrap_or(defaults.hop_length),
            band: TempoBand::new(
                self.min_bpm.unwrap_or(defaults.band.min_bpm),
                self.max_bpm.unwrap_or(defaults.band.max_bpm),
            )?,
            agreement_threshold: self
                .agreement_threshold
                .unwrap_or(defaults.agreement_threshold),
            autocorrelation_secs: self
                .autocorrelation_secs
                .unwrap_or(defaults.autocorrelation_secs),
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse config from simple key=value format
    fn parse(content: &str) -> Self {
        let mut config = Self::default();

        for (number, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                tracing::warn!("Config line {}: expected key=value", number + 1);
                continue;
            };
            let key = key.trim();
            let value = value.trim();

            let parsed = match key {
                "sample_rate" => value.parse().map(|v| config.sample_rate = Some(v)).is_ok(),
                "hop_length" => value.parse().map(|v| config.hop_length = Some(v)).is_ok(),
                "min_bpm" => value.parse().map(|v| config.min_bpm = Some(v)).is_ok(),
                "max_bpm" => value.parse().map(|v| config.max_bpm = Some(v)).is_ok(),
                "agreement_threshold" => value
                    .parse()
                    .map(|v| config.agreement_threshold = Some(v))
                    .is_ok(),
                "autocorrelation_secs" => value
                    .parse()
                    .map(|v| config.autocorrelation_secs = Some(v))
                    .is_ok(),
                _ => {
                    tracing::warn!("Config line {}: unknown key '{}'", number + 1, key);
                    continue;
                }
            };

            if !parsed {
                tracing::warn!(
                    "Config line {}: invalid value '{}' for {}",
                    number + 1,
                    value,
                    key
                );
            }
        }

        config
    }

    /// Serialize config to simple key=value format
    fn serialize(&self) -> String {
        let mut lines = vec!["# Tempo detector configuration".to_string()];

        if let Some(v) = self.sample_rate {
            lines.push(format!("sample_rate={}", v));
        }
        if let Some(v) = self.hop_length {
            lines.push(format!("hop_length={}", v));
        }
        if let Some(v) = self.min_bpm {
            lines.push(format!("min_bpm={}", v));
        }
        if let Some(v) = self.max_bpm {
            lines.push(format!("max_bpm={}", v));
        }
        if let Some(v) = self.agreement_threshold {
            lines.push(format!("agreement_threshold={}", v));
        }
        if let Some(v) = self.autocorrelation_secs {
            lines.push(format!("autocorrelation_secs={}", v));
        }

        lines.join("\n") + "\n"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty() {
        let config = Config::parse("");
        assert_eq!(config, Config::default());
        assert_eq!(config.to_detector_config(), Ok(DetectorConfig::default()));
    }

    #[test]
    fn test_parse_values() {
        let config = Config::parse("hop_length=256\nmin_bpm = 60\nmax_bpm=200\n");
        assert_eq!(config.hop_length, Some(256));
        assert_eq!(config.min_bpm, Some(60.0));
        assert_eq!(config.max_bpm, Some(200.0));
        assert!(config.sample_rate.is_none());

        let detector = config.to_detector_config().unwrap();
        assert_eq!(detector.hop_length, 256);
        assert_eq!(detector.sample_rate, 22050);
        assert_eq!(detector.band, TempoBand::new(60.0, 200.0).unwrap());
    }

    #[test]
    fn test_parse_skips_comments_and_bad_lines() {
        let content = "# Comment\nagreement_threshold=3.5\nnot a pair\nunknown=1\nsample_rate=fast\n";
        let config = Config::parse(content);
        assert_eq!(config.agreement_threshold, Some(3.5));
        assert!(config.sample_rate.is_none());
    }

    #[test]
    fn test_invalid_values_rejected_on_apply() {
        let config = Config::parse("min_bpm=200\nmax_bpm=100");
        assert!(matches!(
            config.to_detector_config(),
            Err(AnalysisError::InvalidConfig(_))
        ));

        let config = Config::parse("hop_length=0");
        assert!(config.to_detector_config().is_err());
    }

    #[test]
    fn test_or_prefers_self() {
        let cli = Config {
            max_bpm: Some(180.0),
            ..Default::default()
        };
        let file = Config {
            min_bpm: Some(70.0),
            max_bpm: Some(250.0),
            ..Default::default()
        };
        let merged = cli.or(file);
        assert_eq!(merged.min_bpm, Some(70.0));
        assert_eq!(merged.max_bpm, Some(180.0));
    }

    #[test]
    fn test_save_and_reload() {
        let detector = DetectorConfig {
            hop_length: 441,
            agreement_threshold: 2.5,
            ..Default::default()
        };
        let config = Config::from_detector(&detector);
        let path = std::env::temp_dir()
            .join(format!("tempo-config-{}", std::process::id()))
            .join("config.txt");

        config.save_to(&path).unwrap();
        let reloaded = Config::load_from(&path).unwrap();
        if let Some(dir) = path.parent() {
            fs::remove_dir_all(dir).ok();
        }

        assert_eq!(reloaded, config);
        assert_eq!(reloaded.to_detector_config(), Ok(detector));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let err = Config::load_from(Path::new("/nonexistent/tempo/config.txt")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
