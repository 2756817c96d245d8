//! Pre-download size probing.
//!
//! Asks yt-dlp for metadata only (`--dump-json`) and decides up front whether
//! any format fits the delivery ceiling, so oversized content is rejected
//! before burning bandwidth. The policy on probe failure is fail open: a
//! broken probe must never block the real download attempt.

use serde_json::Value;

use crate::core::{config, process};
use crate::download::platform::Platform;

/// Outcome of a pre-download size check. Transient; computed before the
/// download decision and not persisted.
#[derive(Debug, Clone)]
pub struct SizeProbe {
    pub can_download: bool,
    pub size_mb: Option<f64>,
    pub resolution: Option<String>,
    pub format_id: Option<String>,
    /// Human-readable rejection reason, set only when can_download is false
    pub reason: Option<String>,
    /// Informational note for fail-open and unsupported-platform cases
    pub note: Option<String>,
}

impl SizeProbe {
    fn open(note: &str) -> Self {
        Self {
            can_download: true,
            size_mb: None,
            resolution: None,
            format_id: None,
            reason: None,
            note: Some(note.to_string()),
        }
    }
}

/// Best candidate format under the ceiling.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FormatChoice {
    pub format_id: String,
    pub size_bytes: u64,
    pub resolution: String,
}

/// Probe a URL against the delivery ceiling.
pub async fn check_media_size(url: &str, max_size_mb: u64) -> SizeProbe {
    check_media_size_with(config::YTDL_BIN.as_str(), url, max_size_mb).await
}

/// Probe with an explicit yt-dlp binary. Used by tests to exercise the
/// fail-open path without a real downloader.
pub(crate) async fn check_media_size_with(bin: &str, url: &str, max_size_mb: u64) -> SizeProbe {
    // The authenticated platform exposes no cheap size metadata; let the
    // download proceed and rely on the post-download ceiling check.
    if Platform::detect(url) == Platform::Instagram {
        return SizeProbe::open("Size check unavailable for Instagram");
    }

    let args = ["--dump-json", "--no-warnings", "--no-playlist", url];
    let output = match process::run_command(bin, &args, config::download::probe_timeout()).await {
        Ok(out) => out,
        Err(e) => {
            log::warn!("⚠️ size probe failed for {}: {}", url, e);
            return SizeProbe::open("Size check failed, attempting download anyway");
        }
    };

    let info: Value = match serde_json::from_str(&output.stdout) {
        Ok(v) => v,
        Err(e) => {
            log::warn!("⚠️ size probe returned unparsable metadata for {}: {}", url, e);
            return SizeProbe::open("Size check failed, attempting download anyway");
        }
    };

    match select_format(&info, max_size_mb) {
        Some(choice) => SizeProbe {
            can_download: true,
            size_mb: Some((choice.size_bytes as f64) / (1024.0 * 1024.0)),
            resolution: Some(choice.resolution),
            format_id: Some(choice.format_id),
            reason: None,
            note: None,
        },
        None => SizeProbe {
            can_download: false,
            size_mb: None,
            resolution: None,
            format_id: None,
            reason: Some(format!("No format found under {}MB", max_size_mb)),
            note: None,
        },
    }
}

/// Pick the largest format still under the ceiling; maximize quality subject
/// to the size constraint. Formats without a reported or approximate size are
/// skipped.
pub(crate) fn select_format(info: &Value, max_size_mb: u64) -> Option<FormatChoice> {
    let ceiling = max_size_mb * 1024 * 1024;
    let formats = info.get("formats").and_then(|v| v.as_array())?;

    let mut best: Option<FormatChoice> = None;
    for fmt in formats {
        let size = fmt
            .get("filesize")
            .and_then(|v| v.as_u64())
            .or_else(|| fmt.get("filesize_approx").and_then(|v| v.as_u64()))
            .unwrap_or(0);
        if size == 0 || size >= ceiling {
            continue;
        }
        if best.as_ref().map(|b| size > b.size_bytes).unwrap_or(true) {
            best = Some(FormatChoice {
                format_id: fmt
                    .get("format_id")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown")
                    .to_string(),
                size_bytes: size,
                resolution: fmt
                    .get("resolution")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown")
                    .to_string(),
            });
        }
    }
    best
}
