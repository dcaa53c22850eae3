//! Audio loading and persisted settings for the tempo detector

mod config;
mod loader;

pub use config::Config;
pub use loader::{FileSource, LoadError, LoadedTrack, TrackLoader, TrackMetadata};
