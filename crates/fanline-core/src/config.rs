//! Configuration module
//!
//! Environment-driven settings for the upload pipeline: platform size
//! limits, the sample duration cap, the classifier probe timeout, and the
//! Content API base URL.

use std::env;

use anyhow::{ensure, Result};

const DEFAULT_API_BASE_URL: &str = "http://localhost:3000";
const DEFAULT_MAX_VIDEO_SIZE_MB: u64 = 4096;
const DEFAULT_MAX_SAMPLE_DURATION_SECS: f64 = 300.0;
const DEFAULT_CLASSIFY_TIMEOUT_SECS: u64 = 4;
const DEFAULT_FFPROBE_PATH: &str = "ffprobe";

/// Upload pipeline configuration.
#[derive(Clone, Debug)]
pub struct UploadConfig {
    pub api_base_url: String,
    /// Platform limit for the main video, checked before any transfer starts.
    pub max_video_size_bytes: u64,
    /// Longest sample clip that may be derived by trimming the main video.
    pub max_sample_duration_secs: f64,
    /// Bound on a single video metadata probe; on expiry the file is
    /// classified square and the submission continues.
    pub classify_timeout_secs: u64,
    pub ffprobe_path: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            max_video_size_bytes: DEFAULT_MAX_VIDEO_SIZE_MB * 1024 * 1024,
            max_sample_duration_secs: DEFAULT_MAX_SAMPLE_DURATION_SECS,
            classify_timeout_secs: DEFAULT_CLASSIFY_TIMEOUT_SECS,
            ffprobe_path: DEFAULT_FFPROBE_PATH.to_string(),
        }
    }
}

impl UploadConfig {
    /// Load from environment, falling back to defaults for unset values.
    pub fn from_env() -> Result<Self> {
        let max_video_size_mb = env::var("FANLINE_MAX_VIDEO_SIZE_MB")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_MAX_VIDEO_SIZE_MB);

        let config = Self {
            api_base_url: env::var("FANLINE_API_URL")
                .or_else(|_| env::var("API_URL"))
                .unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string()),
            max_video_size_bytes: max_video_size_mb * 1024 * 1024,
            max_sample_duration_secs: env::var("FANLINE_MAX_SAMPLE_DURATION_SECS")
                .ok()
                .and_then(|v| v.parse::<f64>().ok())
                .unwrap_or(DEFAULT_MAX_SAMPLE_DURATION_SECS),
            classify_timeout_secs: env::var("FANLINE_CLASSIFY_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(DEFAULT_CLASSIFY_TIMEOUT_SECS),
            ffprobe_path: env::var("FFPROBE_PATH")
                .unwrap_or_else(|_| DEFAULT_FFPROBE_PATH.to_string()),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(!self.api_base_url.is_empty(), "API base URL must not be empty");
        ensure!(
            self.max_video_size_bytes > 0,
            "Max video size must be positive"
        );
        ensure!(
            self.max_sample_duration_secs > 0.0,
            "Max sample duration must be positive"
        );
        ensure!(
            self.classify_timeout_secs > 0,
            "Classifier timeout must be positive"
        );
        ensure!(!self.ffprobe_path.is_empty(), "ffprobe path must not be empty");
        Ok(())
    }
}
