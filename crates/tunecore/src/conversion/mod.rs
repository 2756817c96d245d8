//! Media transcoding via FFmpeg.
//!
//! Three operations, all routed through the process chokepoint:
//! - audio normalization for fingerprinting (never fails; degrades to the
//!   original file)
//! - audio extraction at a configurable bitrate (fails loudly)
//! - video compression to the delivery size ceiling (reports success as a
//!   flag, the caller checks the output)

pub mod audio;
pub mod video;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

use crate::core::error::AppError;
use crate::core::{config, process};

/// Errors that can occur during conversion
#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    #[error("Input file not found: {0}")]
    InputNotFound(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type ConversionResult<T> = Result<T, ConversionError>;

impl From<ConversionError> for AppError {
    fn from(err: ConversionError) -> Self {
        AppError::Transcode(err.to_string())
    }
}

static OUTPUT_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Unique output path under TEMP_FILES_DIR for a conversion product.
pub(crate) fn temp_output_path(prefix: &str, ext: &str) -> PathBuf {
    let seq = OUTPUT_COUNTER.fetch_add(1, Ordering::Relaxed);
    Path::new(config::TEMP_FILES_DIR.as_str()).join(format!(
        "{}_{}_{}.{}",
        prefix,
        std::process::id(),
        seq,
        ext
    ))
}

/// Run ffmpeg with the shared argument prelude and map failures into
/// `ConversionError`.
pub(crate) async fn run_ffmpeg(args: &[&str], timeout: std::time::Duration) -> ConversionResult<()> {
    let mut full_args = vec!["-hide_banner", "-loglevel", "error", "-y"];
    full_args.extend_from_slice(args);

    match process::run_command(config::FFMPEG_BIN.as_str(), &full_args, timeout).await {
        Ok(_) => Ok(()),
        Err(AppError::ProcessFailure { stderr_tail, .. }) => {
            log::error!("FFmpeg error: {}", stderr_tail);
            Err(ConversionError::FfmpegError(stderr_tail))
        }
        Err(e) => Err(ConversionError::FfmpegError(e.to_string())),
    }
}

/// Media duration in seconds via ffprobe. Returns None when the probe fails;
/// duration is caption garnish, not a hard requirement.
pub async fn probe_duration_seconds<P: AsRef<Path>>(path: P) -> Option<f64> {
    let path_str = path.as_ref().to_string_lossy().to_string();
    let args = [
        "-v",
        "error",
        "-show_entries",
        "format=duration",
        "-of",
        "default=noprint_wrappers=1:nokey=1",
        path_str.as_str(),
    ];
    let output = process::run_command(
        config::FFPROBE_BIN.as_str(),
        &args,
        config::transcode::ffprobe_timeout(),
    )
    .await
    .ok()?;
    output.stdout.trim().parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_output_path_is_unique() {
        let a = temp_output_path("clip", "wav");
        let b = temp_output_path("clip", "wav");
        assert_ne!(a, b);
        assert!(a.to_string_lossy().ends_with(".wav"));
    }

    #[tokio::test]
    async fn test_probe_duration_missing_file() {
        assert_eq!(probe_duration_seconds("/nonexistent/clip_42.mp4").await, None);
    }
}
