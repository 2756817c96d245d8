//! Video compression to the delivery size ceiling.

use std::path::Path;

use super::run_ffmpeg;
use crate::core::config;

/// Options for video compression
#[derive(Debug, Clone)]
pub struct CompressionOptions {
    /// Target CRF value (18-28, higher = more compression, lower quality)
    pub crf: u8,
    /// Bounding box; the aspect ratio is preserved
    pub max_width: u32,
    pub max_height: u32,
    pub video_bitrate: &'static str,
    pub max_video_bitrate: &'static str,
    pub audio_bitrate: &'static str,
}

impl Default for CompressionOptions {
    fn default() -> Self {
        Self {
            crf: 28,
            max_width: 1280,
            max_height: 720,
            video_bitrate: "1500k",
            max_video_bitrate: "2000k",
            audio_bitrate: "128k",
        }
    }
}

/// Re-encode a video down the resolution/bitrate ladder so it fits the
/// delivery ceiling with margin.
///
/// Returns whether the pass succeeded; it never errors. The caller checks
/// the output file's existence and size; an output that is still over the
/// ceiling counts as a failure on the caller's side.
pub async fn compress_video<P: AsRef<Path>, Q: AsRef<Path>>(input_path: P, target_path: Q) -> bool {
    compress_video_with(input_path, target_path, CompressionOptions::default()).await
}

/// Compression with explicit options.
pub async fn compress_video_with<P: AsRef<Path>, Q: AsRef<Path>>(
    input_path: P,
    target_path: Q,
    options: CompressionOptions,
) -> bool {
    let input = input_path.as_ref();
    let target = target_path.as_ref();

    if !input.exists() {
        log::warn!("⚠️ compression input missing: {}", input.display());
        return false;
    }

    let scale = format!(
        "scale='min({},iw)':'min({},ih)':force_original_aspect_ratio=decrease",
        options.max_width, options.max_height
    );
    let crf = options.crf.to_string();
    let input_str = input.to_string_lossy().to_string();
    let target_str = target.to_string_lossy().to_string();

    let args = [
        "-i",
        input_str.as_str(),
        "-vf",
        scale.as_str(),
        "-c:v",
        "libx264",
        "-preset",
        "medium",
        "-crf",
        crf.as_str(),
        "-b:v",
        options.video_bitrate,
        "-maxrate",
        options.max_video_bitrate,
        "-bufsize",
        "3000k",
        "-c:a",
        "aac",
        "-b:a",
        options.audio_bitrate,
        "-movflags",
        "+faststart",
        target_str.as_str(),
    ];

    match run_ffmpeg(&args, config::transcode::compress_timeout()).await {
        Ok(()) if target.exists() => {
            let size_mb = std::fs::metadata(target)
                .map(|m| m.len() as f64 / (1024.0 * 1024.0))
                .unwrap_or(0.0);
            log::info!("✅ compressed video to {:.2}MB", size_mb);
            true
        }
        Ok(()) => false,
        Err(e) => {
            log::warn!("⚠️ video compression failed: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compression_options_default() {
        let opts = CompressionOptions::default();
        assert_eq!(opts.crf, 28);
        assert_eq!(opts.max_width, 1280);
        assert_eq!(opts.max_height, 720);
        assert_eq!(opts.audio_bitrate, "128k");
    }

    #[tokio::test]
    async fn test_compress_missing_input_returns_false() {
        let ok = compress_video("/nonexistent/in_42.mp4", "/tmp/out_42.mp4").await;
        assert!(!ok);
    }
}
