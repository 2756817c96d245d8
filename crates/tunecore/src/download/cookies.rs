//! Browser-exported cookie file discovery.
//!
//! The cookie file is consumed read-only by yt-dlp (`--cookies`). It is never
//! created or modified here; operators export it from a browser and point
//! COOKIES_FILE at it.

use std::path::{Path, PathBuf};

use crate::core::config;

/// Resolve the configured cookie file to an existing path.
///
/// Expands a leading tilde. Returns None when the file does not exist so
/// callers simply omit the `--cookies` flag.
pub fn resolve_cookie_file() -> Option<PathBuf> {
    resolve_path(config::COOKIES_FILE.as_str())
}

fn resolve_path(configured: &str) -> Option<PathBuf> {
    if configured.is_empty() {
        return None;
    }
    let expanded = if Path::new(configured).is_absolute() {
        configured.to_string()
    } else {
        shellexpand::tilde(configured).to_string()
    };
    let path = PathBuf::from(expanded);
    if path.exists() {
        Some(path)
    } else {
        None
    }
}
