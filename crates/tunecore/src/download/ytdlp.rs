//! Retry-strategy download engine.
//!
//! One engine walks every platform's strategy table instead of a hand-rolled
//! retry loop per platform. For each strategy, in order: build the yt-dlp
//! invocation, run it through the process chokepoint bounded by the
//! strategy's timeout plus a grace period, then scan the working directory
//! for newly created files. The first strategy that yields files is the
//! final result; exhaustion surfaces the last strategy's error.

use std::time::Duration;

use crate::core::error::{AppError, AppResult};
use crate::core::{config, process};
use crate::download::platform::Platform;
use crate::download::strategy::{format_selector, strategies_for, DownloadStrategy};
use crate::download::{cookies, new_files_since, snapshot_files, DownloadRequest, DownloadResult};

/// Relative output template; yt-dlp runs with the working directory as cwd.
const OUTPUT_TEMPLATE: &str = "media.%(ext)s";

/// yt-dlp driver for all non-authenticated platforms.
pub struct YtDlpEngine {
    bin: String,
    backoff_unit: Duration,
}

impl YtDlpEngine {
    pub fn new() -> Self {
        Self {
            bin: config::YTDL_BIN.clone(),
            backoff_unit: config::download::backoff_unit(),
        }
    }

    /// Engine over an explicit downloader binary. Used by tests with stub
    /// scripts.
    pub fn with_binary(bin: impl Into<String>) -> Self {
        Self {
            bin: bin.into(),
            backoff_unit: config::download::backoff_unit(),
        }
    }

    /// Override the linear backoff unit. Used by tests to keep the
    /// strategy walk fast.
    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    /// Walk the platform's strategy table until one produces output files.
    ///
    /// Returns `AllStrategiesExhausted` carrying the last strategy's error
    /// when the whole table fails; the caller translates that into a terminal
    /// `DownloadResult`.
    pub async fn download(&self, request: &DownloadRequest) -> AppResult<DownloadResult> {
        let platform = Platform::detect(&request.url);
        let strategies = strategies_for(platform);
        let total = strategies.len();
        let mut last_error: Option<AppError> = None;

        for (index, strategy) in strategies.iter().enumerate() {
            log::info!(
                "⬇️ {} strategy {}/{}: {} for {}",
                platform,
                index + 1,
                total,
                strategy.name,
                request.url
            );

            match self.try_strategy(request, platform, strategy).await {
                Ok(result) => {
                    log::info!(
                        "✅ {} download succeeded with [{}] ({} file(s))",
                        platform,
                        strategy.name,
                        result.file_paths.len()
                    );
                    return Ok(result);
                }
                Err(e) => {
                    log::warn!("⚠️ strategy [{}] failed: {}", strategy.name, e);
                    last_error = Some(e);
                }
            }

            if index + 1 < total {
                let delay = self.backoff_unit * (index as u32 + 1);
                log::info!("⏳ waiting {:?} before next strategy", delay);
                tokio::time::sleep(delay).await;

                if index + 1 == config::download::CACHE_CLEAR_BEFORE_STRATEGY {
                    self.clear_cache().await;
                }
            }
        }

        log::error!("❌ all {} strategies failed for {}", total, request.url);
        Err(AppError::AllStrategiesExhausted {
            last: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no strategies attempted".to_string()),
        })
    }

    /// Run a single strategy and scan for its output.
    async fn try_strategy(
        &self,
        request: &DownloadRequest,
        platform: Platform,
        strategy: &DownloadStrategy,
    ) -> AppResult<DownloadResult> {
        let args = build_args(request, platform, strategy);
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let deadline = Duration::from_secs(strategy.socket_timeout_secs) + config::download::grace_period();

        let before = snapshot_files(&request.working_dir)?;
        process::run_command_in(&self.bin, &arg_refs, Some(&request.working_dir), deadline).await?;

        let files = new_files_since(&request.working_dir, &before)?;
        if files.is_empty() {
            return Err(AppError::NoFilesProduced);
        }

        Ok(DownloadResult::succeeded(platform, files, strategy.name))
    }

    /// Purge the yt-dlp cache. Best-effort; a failed purge is not a reason
    /// to skip the remaining strategies.
    async fn clear_cache(&self) {
        let timeout = Duration::from_secs(config::download::CACHE_CLEAR_TIMEOUT_SECS);
        match process::run_command(&self.bin, &["--rm-cache-dir"], timeout).await {
            Ok(_) => log::info!("🗑️ cleared yt-dlp cache"),
            Err(e) => log::debug!("cache clear failed (ignored): {}", e),
        }
    }
}

impl Default for YtDlpEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the yt-dlp invocation for one strategy.
fn build_args(request: &DownloadRequest, platform: Platform, strategy: &DownloadStrategy) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-f".into(),
        format_selector(request.audio_only),
        "-o".into(),
        OUTPUT_TEMPLATE.into(),
        "--no-playlist".into(),
        "--no-warnings".into(),
        "--no-color".into(),
        "--geo-bypass".into(),
        "--socket-timeout".into(),
        strategy.socket_timeout_secs.to_string(),
        "--retries".into(),
        strategy.retries.to_string(),
        "--fragment-retries".into(),
        strategy.fragment_retries.to_string(),
    ];

    if request.audio_only {
        args.extend(["--extract-audio".into(), "--audio-format".into(), "mp3".into()]);
    } else {
        args.extend(["--merge-output-format".into(), "mp4".into()]);
    }

    if let Some(extractor_args) = strategy.extractor_args(platform) {
        args.extend(["--extractor-args".into(), extractor_args]);
    }

    if let Some(user_agent) = strategy.user_agent {
        args.extend(["--user-agent".into(), user_agent.into()]);
    }

    if let Some(cookie_file) = cookies::resolve_cookie_file() {
        log::debug!("🍪 using cookie file {}", cookie_file.display());
        args.extend(["--cookies".into(), cookie_file.display().to_string()]);
    }

    args.push(request.url.clone());
    args
}
