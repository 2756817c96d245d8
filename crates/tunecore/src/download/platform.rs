//! Platform classification from URLs.
//!
//! Pure substring matching against a fixed domain-fragment table. No network,
//! no failure modes; unknown hosts classify as `Other` and go through the
//! generic yt-dlp path.

use std::fmt;

/// Supported source platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Instagram,
    TikTok,
    YouTube,
    Twitter,
    Facebook,
    Other,
}

/// Domain fragments in match priority order; first hit wins.
const DOMAIN_TABLE: &[(&str, Platform)] = &[
    ("instagram.com", Platform::Instagram),
    ("instagr.am", Platform::Instagram),
    ("tiktok.com", Platform::TikTok),
    ("vm.tiktok.com", Platform::TikTok),
    ("youtube.com", Platform::YouTube),
    ("youtu.be", Platform::YouTube),
    ("twitter.com", Platform::Twitter),
    ("x.com", Platform::Twitter),
    ("facebook.com", Platform::Facebook),
    ("fb.watch", Platform::Facebook),
];

impl Platform {
    /// Classify a URL by case-insensitive substring match, first match wins.
    pub fn detect(url: &str) -> Platform {
        let url_lower = url.to_lowercase();
        DOMAIN_TABLE
            .iter()
            .find(|(fragment, _)| url_lower.contains(fragment))
            .map(|(_, platform)| *platform)
            .unwrap_or(Platform::Other)
    }

    /// Whether downloads from this platform go through the authenticated
    /// session downloader instead of yt-dlp.
    pub fn requires_auth(&self) -> bool {
        matches!(self, Platform::Instagram)
    }

    /// Display name for captions and status messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::Instagram => "Instagram",
            Platform::TikTok => "TikTok",
            Platform::YouTube => "YouTube",
            Platform::Twitter => "Twitter",
            Platform::Facebook => "Facebook",
            Platform::Other => "the source site",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}
