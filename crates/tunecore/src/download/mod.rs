//! Media acquisition: platform classification, size probing, the
//! retry-strategy yt-dlp engine, and the authenticated Instagram downloader.
//!
//! Every download runs inside a request-scoped [`WorkDir`] that is removed
//! (best-effort) when the request finishes, whatever path it took.

pub mod cookies;
pub mod instagram;
pub mod platform;
pub mod probe;
pub mod strategy;
pub mod ytdlp;
pub mod ytdlp_errors;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::core::config;
use crate::core::error::AppResult;
use platform::Platform;

/// One download request. Created per user action, immutable, owned by the
/// call that created it, and gone when the working directory is cleaned up.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    /// Link or yt-dlp search target (e.g. `ytsearch1:<query>`)
    pub url: String,
    /// Request-scoped scratch directory; downloads land here
    pub working_dir: PathBuf,
    /// Extract audio instead of keeping the video container
    pub audio_only: bool,
}

/// Terminal snapshot of a download attempt. Either a success carrying the
/// produced files or a failure carrying the error text; never partially
/// filled in.
#[derive(Debug, Clone)]
pub struct DownloadResult {
    pub success: bool,
    /// Discovery order inside the working directory
    pub file_paths: Vec<PathBuf>,
    pub platform: Platform,
    /// Name of the strategy (or content handler) that produced the files
    pub method_used: Option<String>,
    /// Post caption / engagement metadata, when the source exposes it
    pub caption: Option<String>,
    pub error: Option<String>,
}

impl DownloadResult {
    pub fn succeeded(platform: Platform, file_paths: Vec<PathBuf>, method_used: &str) -> Self {
        Self {
            success: true,
            file_paths,
            platform,
            method_used: Some(method_used.to_string()),
            caption: None,
            error: None,
        }
    }

    pub fn failed(platform: Platform, error: impl Into<String>) -> Self {
        Self {
            success: false,
            file_paths: Vec::new(),
            platform,
            method_used: None,
            caption: None,
            error: Some(error.into()),
        }
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }
}

static WORKDIR_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Request-scoped working directory under TEMP_FILES_DIR.
///
/// Exclusively owned by one request; removal on drop is best-effort and
/// tolerates failures (a busy NFS mount must not take the request down).
#[derive(Debug)]
pub struct WorkDir {
    path: PathBuf,
}

impl WorkDir {
    /// Create a fresh directory with a unique suffix.
    pub fn create(prefix: &str) -> AppResult<Self> {
        let seq = WORKDIR_COUNTER.fetch_add(1, Ordering::Relaxed);
        let name = format!("{}_{}_{}", prefix, std::process::id(), seq);
        let path = Path::new(config::TEMP_FILES_DIR.as_str()).join(name);
        fs_err::create_dir_all(&path)?;
        Ok(Self { path })
    }

    /// Create under an explicit root instead of TEMP_FILES_DIR. Used by tests.
    pub fn create_in(root: &Path, prefix: &str) -> AppResult<Self> {
        let seq = WORKDIR_COUNTER.fetch_add(1, Ordering::Relaxed);
        let path = root.join(format!("{}_{}", prefix, seq));
        fs_err::create_dir_all(&path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!("⚠️ failed to clean working dir {}: {}", self.path.display(), e);
            }
        }
    }
}

/// Snapshot the non-hidden file names currently in a directory.
pub(crate) fn snapshot_files(dir: &Path) -> AppResult<HashSet<String>> {
    let mut names = HashSet::new();
    for entry in fs_err::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if !name.starts_with('.') {
            names.insert(name);
        }
    }
    Ok(names)
}

/// Non-hidden files that appeared since the snapshot, sorted by name so the
/// discovery order is stable.
pub(crate) fn new_files_since(dir: &Path, before: &HashSet<String>) -> AppResult<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in fs_err::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') || before.contains(&name) {
            continue;
        }
        // yt-dlp keeps in-flight data in .part files; skip anything that is
        // still being written.
        if name.ends_with(".part") || name.ends_with(".ytdl") {
            continue;
        }
        if entry.path().is_file() {
            paths.push(entry.path());
        }
    }
    paths.sort();
    Ok(paths)
}

/// Whether a path looks like a video container we can extract audio from or
/// compress.
pub(crate) fn is_video_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()).map(|e| e.to_lowercase()).as_deref(),
        Some("mp4" | "mov" | "mkv" | "avi" | "webm")
    )
}
