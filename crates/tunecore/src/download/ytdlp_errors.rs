//! Advisory classification of downloader failures.
//!
//! Maps raw yt-dlp error text onto a guidance category by case-insensitive
//! substring matching, so the user gets cause-specific advice instead of a
//! stderr dump. The classification is advisory only: it never feeds back into
//! retry or routing decisions, which keeps the engine decoupled from the
//! incidental wording of an external tool's output.

/// Guidance category for a failed download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadFailureKind {
    /// The platform detected automated access
    BotDetection,
    /// HTTP 403 / forbidden; geo-block, deletion, or auth wall
    AccessForbidden,
    /// Content requires a login or a trust relationship
    PrivateContent,
    /// Content deleted or the link is wrong
    NotFound,
    /// Network-level timeout
    Timeout,
    /// Anything else
    Unknown,
}

/// Classify raw error text. First matching bucket wins.
pub fn classify_failure(error_text: &str) -> DownloadFailureKind {
    let lower = error_text.to_lowercase();

    if lower.contains("sign in")
        || lower.contains("bot detection")
        || lower.contains("confirm you're not a bot")
        || lower.contains("captcha")
    {
        return DownloadFailureKind::BotDetection;
    }

    if lower.contains("private") || lower.contains("login required") || lower.contains("authentication required") {
        return DownloadFailureKind::PrivateContent;
    }

    if lower.contains("403") || lower.contains("forbidden") {
        return DownloadFailureKind::AccessForbidden;
    }

    if lower.contains("404") || lower.contains("not found") || lower.contains("no longer available") {
        return DownloadFailureKind::NotFound;
    }

    if lower.contains("timed out") || lower.contains("timeout") {
        return DownloadFailureKind::Timeout;
    }

    DownloadFailureKind::Unknown
}

/// User-facing guidance text for a failure category.
pub fn guidance_message(kind: DownloadFailureKind) -> &'static str {
    match kind {
        DownloadFailureKind::BotDetection => {
            "🤖 Bot detection triggered.\n\nThe platform flagged automated access. Try again in a few minutes, refresh the cookie file, or use a VPN."
        }
        DownloadFailureKind::AccessForbidden => {
            "🚫 Access forbidden.\n\nThis content may be geo-blocked in the server's region, deleted, or behind an authentication wall."
        }
        DownloadFailureKind::PrivateContent => {
            "🔒 This content is private.\n\nThe account used by the bot must follow the content owner before it can be downloaded."
        }
        DownloadFailureKind::NotFound => {
            "❌ Content not found.\n\nThe post may have been deleted, or the link is incorrect."
        }
        DownloadFailureKind::Timeout => {
            "⏱ Connection timed out.\n\nThe source was too slow to respond. Try again in a minute."
        }
        DownloadFailureKind::Unknown => {
            "❌ Download failed.\n\nCheck that the link is correct, or try again later."
        }
    }
}

/// Whether an operator should be pinged about this failure category.
/// Bot detection usually means the cookie file went stale.
pub fn should_notify_admin(kind: DownloadFailureKind) -> bool {
    matches!(
        kind,
        DownloadFailureKind::BotDetection | DownloadFailureKind::Unknown
    )
}
