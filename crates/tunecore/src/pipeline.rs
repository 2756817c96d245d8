//! Inbound surface called by the delivery adapter (the chat front-end).
//!
//! The adapter hands over a link, an audio attachment, or a free-text music
//! query; everything after that (rate limiting, platform routing, size
//! probing, download, transcoding, identification) happens here. Results
//! come back as delivery-ready file lists or user-facing text; the adapter
//! never sees raw errors.
//!
//! All shared components are owned here and threaded through construction:
//! no ambient globals beyond the environment-derived configuration.

use std::path::PathBuf;
use std::sync::Arc;

use crate::conversion;
use crate::core::config::limits;
use crate::core::error::AppError;
use crate::core::RateLimiter;
use crate::download::instagram::InstagramDownloader;
use crate::download::platform::Platform;
use crate::download::ytdlp::YtDlpEngine;
use crate::download::ytdlp_errors::{classify_failure, guidance_message};
use crate::download::{is_video_file, probe, DownloadRequest, DownloadResult, WorkDir};
use crate::identify::Identifier;

/// Files ready for delivery. Owns the working directory; it is cleaned up
/// when this value drops, so the adapter must send the files first.
#[derive(Debug)]
pub struct LinkDelivery {
    pub files: Vec<PathBuf>,
    pub caption: Option<String>,
    pub platform: Platform,
    pub method_used: Option<String>,
    /// Informational notes accumulated along the way (probe results,
    /// compression outcomes, dropped files)
    pub notes: Vec<String>,
    work_dir: WorkDir,
}

impl LinkDelivery {
    /// The scratch directory holding the delivered files.
    pub fn work_dir(&self) -> &std::path::Path {
        self.work_dir.path()
    }
}

/// Outcome of a link request: files to send, or text to show.
#[derive(Debug)]
pub enum LinkOutcome {
    Delivered(LinkDelivery),
    Rejected { message: String },
}

/// Outcome of a free-text music search.
#[derive(Debug)]
pub struct SearchOutcome {
    /// Catalog matches rendered for the chat
    pub message: String,
    /// Best-effort MP3 of the top result; the work dir is owned alongside
    pub audio: Option<(WorkDir, PathBuf)>,
}

/// The acquisition + identification pipeline.
pub struct Pipeline {
    engine: YtDlpEngine,
    instagram: Arc<InstagramDownloader>,
    identifier: Identifier,
    rate_limiter: RateLimiter,
}

impl Pipeline {
    pub fn new() -> Self {
        Self {
            engine: YtDlpEngine::new(),
            instagram: Arc::new(InstagramDownloader::new()),
            identifier: Identifier::new(),
            rate_limiter: RateLimiter::new(),
        }
    }

    /// Assemble from explicit components. Used by tests and by embedders
    /// that share the Instagram session with other subsystems.
    pub fn with_components(
        engine: YtDlpEngine,
        instagram: Arc<InstagramDownloader>,
        identifier: Identifier,
        rate_limiter: RateLimiter,
    ) -> Self {
        Self {
            engine,
            instagram,
            identifier,
            rate_limiter,
        }
    }

    /// Handle a media link: download, fit under the delivery ceiling, and
    /// return the files (or a cause-specific explanation).
    pub async fn handle_link(&self, url: &str, user_id: u64, audio_only: bool) -> LinkOutcome {
        if !self.rate_limiter.is_allowed(user_id).await {
            let wait = self.rate_limiter.time_until_allowed(user_id).await;
            return LinkOutcome::Rejected {
                message: format!(
                    "⏱ Rate limit exceeded. Please wait {} seconds.\nLimit: 10 downloads per minute.",
                    wait
                ),
            };
        }

        let url = url.trim();
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return LinkOutcome::Rejected {
                message: "⚠️ That doesn't look like a link I can download.".to_string(),
            };
        }

        let platform = Platform::detect(url);
        log::info!("📥 download request from user {} ({})", user_id, platform);

        let mut notes = Vec::new();

        // Pre-download ceiling check; a failed probe never blocks the
        // attempt.
        if !platform.requires_auth() {
            let probe = probe::check_media_size(url, limits::MAX_FILE_MB).await;
            if !probe.can_download {
                let reason = probe.reason.unwrap_or_else(|| "content too large".to_string());
                return LinkOutcome::Rejected {
                    message: format!("❌ {}\n\n💡 Try requesting a shorter clip or audio extraction instead.", reason),
                };
            }
            if let Some(size_mb) = probe.size_mb {
                notes.push(format!(
                    "~{:.1}MB, {}",
                    size_mb,
                    probe.resolution.unwrap_or_else(|| "unknown resolution".to_string())
                ));
            }
            if let Some(note) = probe.note {
                log::info!("probe note: {}", note);
            }
        }

        let work_dir = match WorkDir::create("media") {
            Ok(dir) => dir,
            Err(e) => {
                log::error!("failed to create working dir: {}", e);
                return LinkOutcome::Rejected {
                    message: "❌ Internal storage error, try again later.".to_string(),
                };
            }
        };

        let result = self.run_download(url, platform, &work_dir, audio_only).await;

        let result = match result {
            Ok(result) => result,
            Err(e) => return LinkOutcome::Rejected { message: explain_failure(&e) },
        };

        if !result.success {
            let message = result
                .error
                .unwrap_or_else(|| guidance_message(classify_failure("")).to_string());
            return LinkOutcome::Rejected { message };
        }

        let (files, mut size_notes) = self.fit_under_ceiling(result.file_paths, &work_dir, url).await;
        notes.append(&mut size_notes);

        if files.is_empty() {
            return LinkOutcome::Rejected {
                message: format!(
                    "⚠️ Nothing deliverable came out of this post.\nIt may exceed the size limit even after compression.\nView it here instead: {}",
                    url
                ),
            };
        }

        LinkOutcome::Delivered(LinkDelivery {
            files,
            caption: result.caption,
            platform,
            method_used: result.method_used,
            notes,
            work_dir,
        })
    }

    /// Identify an audio attachment. Always returns displayable text.
    pub async fn handle_audio_attachment(&self, local_path: &std::path::Path, hint: Option<&str>) -> String {
        self.identifier.identify_audio(local_path, hint).await
    }

    /// Free-text music search: catalog matches plus a best-effort MP3 fetch
    /// of the top result.
    pub async fn search_and_fetch(&self, query: &str, user_id: u64) -> SearchOutcome {
        if !self.rate_limiter.is_allowed(user_id).await {
            let wait = self.rate_limiter.time_until_allowed(user_id).await;
            return SearchOutcome {
                message: format!("⏱ Rate limit exceeded. Please wait {} seconds.", wait),
                audio: None,
            };
        }

        let message = self.identifier.spotify().search_message(query).await;

        let audio = match self.fetch_search_result(query).await {
            Ok(found) => found,
            Err(e) => {
                log::warn!("search download failed for {:?}: {}", query, e);
                None
            }
        };

        SearchOutcome { message, audio }
    }

    /// Download the top search hit as MP3 into a fresh working directory.
    async fn fetch_search_result(&self, query: &str) -> Result<Option<(WorkDir, PathBuf)>, AppError> {
        let work_dir = WorkDir::create("search")?;
        let request = DownloadRequest {
            url: format!("ytsearch1:{}", query),
            working_dir: work_dir.path().to_path_buf(),
            audio_only: true,
        };
        let result = self.engine.download(&request).await?;
        Ok(result.file_paths.into_iter().next().map(|path| (work_dir, path)))
    }

    /// Route to the right downloader and apply the audio-only post-pass for
    /// handlers that return video containers.
    async fn run_download(
        &self,
        url: &str,
        platform: Platform,
        work_dir: &WorkDir,
        audio_only: bool,
    ) -> Result<DownloadResult, AppError> {
        if platform.requires_auth() {
            let mut result = self.instagram.download_content(url, work_dir.path()).await?;
            if audio_only && result.success {
                result.file_paths = self.extract_audio_tracks(result.file_paths).await?;
            }
            return Ok(result);
        }

        let request = DownloadRequest {
            url: url.to_string(),
            working_dir: work_dir.path().to_path_buf(),
            audio_only,
        };
        self.engine.download(&request).await
    }

    /// Replace video files with extracted MP3 tracks.
    async fn extract_audio_tracks(&self, paths: Vec<PathBuf>) -> Result<Vec<PathBuf>, AppError> {
        let mut audio_paths = Vec::new();
        for path in paths {
            if is_video_file(&path) {
                let extracted = conversion::audio::extract_audio(&path, "192").await?;
                audio_paths.push(extracted);
            } else {
                audio_paths.push(path);
            }
        }
        Ok(audio_paths)
    }

    /// Post-download ceiling pass: oversized videos get one compression
    /// attempt; files that still do not fit are dropped with a note.
    async fn fit_under_ceiling(
        &self,
        paths: Vec<PathBuf>,
        work_dir: &WorkDir,
        url: &str,
    ) -> (Vec<PathBuf>, Vec<String>) {
        let mut kept = Vec::new();
        let mut notes = Vec::new();

        for (index, path) in paths.into_iter().enumerate() {
            let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
            if size <= limits::MAX_FILE_BYTES {
                kept.push(path);
                continue;
            }

            if !is_video_file(&path) {
                notes.push(format!(
                    "⚠️ Skipped a {:.1}MB file over the {}MB limit.",
                    size as f64 / (1024.0 * 1024.0),
                    limits::MAX_FILE_MB
                ));
                continue;
            }

            log::info!(
                "⚙️ compressing oversized video ({:.1}MB)",
                size as f64 / (1024.0 * 1024.0)
            );
            let compressed = work_dir.path().join(format!("compressed_{:02}.mp4", index));
            let ok = conversion::video::compress_video(&path, &compressed).await;
            let compressed_size = std::fs::metadata(&compressed).map(|m| m.len()).unwrap_or(u64::MAX);

            if ok && compressed_size < limits::MAX_FILE_BYTES {
                notes.push("⚙️ Video was compressed to fit the size limit.".to_string());
                kept.push(compressed);
            } else {
                notes.push(format!(
                    "⚠️ A video was too large to send even after compression.\nView it here: {}",
                    url
                ));
            }
        }

        (kept, notes)
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Translate a pipeline error into short, cause-specific guidance.
///
/// Terminal auth/privacy errors carry their own copy; everything else goes
/// through the advisory failure classifier. Classification never changes
/// what the pipeline did; it only picks the explanation.
pub(crate) fn explain_failure(error: &AppError) -> String {
    match error {
        AppError::AuthChallengeRequired(msg) | AppError::AuthInvalidCredentials(msg) => {
            format!("🔐 {}", msg)
        }
        AppError::ContentPrivate(msg) => format!("🔒 {}", msg),
        AppError::ContentNotFound(msg) => format!("❌ Content not found: {}", msg),
        AppError::NotConfigured(what) => format!("⚠️ {} is not configured on this deployment.", what),
        AppError::AllStrategiesExhausted { last } => guidance_message(classify_failure(last)).to_string(),
        other => guidance_message(classify_failure(&other.to_string())).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::ytdlp_errors::DownloadFailureKind;

    #[test]
    fn test_explain_failure_terminal_errors_keep_their_copy() {
        let err = AppError::ContentPrivate("The bot account must follow this user first.".to_string());
        let text = explain_failure(&err);
        assert!(text.starts_with("🔒"));
        assert!(text.contains("follow"));
    }

    #[test]
    fn test_explain_failure_exhaustion_classifies_last_error() {
        let err = AppError::AllStrategiesExhausted {
            last: "ERROR: Sign in to confirm you're not a bot".to_string(),
        };
        let text = explain_failure(&err);
        assert_eq!(text, guidance_message(DownloadFailureKind::BotDetection));
    }

    #[test]
    fn test_explain_failure_timeout() {
        let err = AppError::ProcessTimeout { secs: 90 };
        let text = explain_failure(&err);
        assert_eq!(text, guidance_message(DownloadFailureKind::Timeout));
    }

    #[tokio::test]
    async fn test_handle_link_rejects_non_urls() {
        let pipeline = Pipeline::with_components(
            YtDlpEngine::with_binary("/bin/false"),
            Arc::new(InstagramDownloader::with_credentials(
                None,
                None,
                std::path::PathBuf::from("/tmp/no_session.json"),
            )),
            Identifier::with_spotify(crate::identify::spotify::SpotifyClient::with_credentials(None)),
            RateLimiter::new(),
        );
        match pipeline.handle_link("just some text", 1, false).await {
            LinkOutcome::Rejected { message } => assert!(message.contains("link")),
            other => panic!("expected rejection, got: {:?}", other),
        }
    }
}
