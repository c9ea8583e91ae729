//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Scratch directory for intermediate media
    pub temp_dir: PathBuf,
    /// Destination of locally mixed variations
    pub output_dir: PathBuf,
    /// Delay between prediction polls
    pub poll_interval: Duration,
    /// Poll budget per clip before giving up
    pub max_poll_attempts: u32,
    /// Kill FFmpeg after this many seconds
    pub ffmpeg_timeout_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            temp_dir: PathBuf::from("./temp"),
            output_dir: PathBuf::from("./output"),
            poll_interval: Duration::from_millis(3000),
            max_poll_attempts: 60,
            ffmpeg_timeout_secs: 900,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            temp_dir: std::env::var("VMIX_TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./temp")),
            output_dir: std::env::var("VMIX_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./output")),
            poll_interval: Duration::from_millis(
                std::env::var("VMIX_POLL_INTERVAL_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(3000),
            ),
            max_poll_attempts: std::env::var("VMIX_MAX_POLL_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(60),
            ffmpeg_timeout_secs: std::env::var("VMIX_FFMPEG_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(900),
        }
    }

    /// Create the temp and output directories.
    pub async fn ensure_dirs(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.temp_dir).await?;
        tokio::fs::create_dir_all(&self.output_dir).await
    }
}
