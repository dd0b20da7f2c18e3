//! Worker configuration.

use std::path::PathBuf;

/// Source/target formats handled by the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionProfile {
    /// Key suffix of eligible source objects (matched case-sensitively)
    pub source_suffix: String,
    /// Suffix substituted for `source_suffix` in target keys and paths
    pub target_suffix: String,
    /// Content type set on uploaded targets
    pub content_type: String,
}

impl Default for ConversionProfile {
    fn default() -> Self {
        Self {
            source_suffix: ".mov".to_string(),
            target_suffix: ".mp4".to_string(),
            content_type: "video/mp4".to_string(),
        }
    }
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Scratch root for downloaded and converted files
    pub scratch_dir: PathBuf,
    /// Formats to convert between
    pub profile: ConversionProfile,
    /// Explicit FFmpeg binary; resolved on PATH when unset
    pub ffmpeg_path: Option<PathBuf>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            scratch_dir: PathBuf::from("/tmp"),
            profile: ConversionProfile::default(),
            ffmpeg_path: None,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = ConversionProfile::default();

        Self {
            scratch_dir: std::env::var("VCONV_SCRATCH_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/tmp")),
            profile: ConversionProfile {
                source_suffix: std::env::var("VCONV_SOURCE_SUFFIX")
                    .unwrap_or(defaults.source_suffix),
                target_suffix: std::env::var("VCONV_TARGET_SUFFIX")
                    .unwrap_or(defaults.target_suffix),
                content_type: std::env::var("VCONV_TARGET_CONTENT_TYPE")
                    .unwrap_or(defaults.content_type),
            },
            ffmpeg_path: std::env::var("FFMPEG_PATH").ok().map(PathBuf::from),
        }
    }

    /// Use a different scratch root.
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }
}
