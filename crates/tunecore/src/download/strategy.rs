//! Per-platform download strategy tables.
//!
//! A strategy is one fully-parameterized yt-dlp attempt: timeouts, retry
//! counts, API hostname, and network identity. Each platform defines an
//! ordered, non-empty sequence walked from the least to the most permissive
//! entry; platforms without special handling get a single default strategy.
//! Parameterizing what differs keeps one retry engine instead of a loop per
//! platform.

use crate::core::config::limits;
use crate::download::platform::Platform;

/// Desktop Chrome user agent used for web API strategies.
pub const DESKTOP_UA: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// TikTok mobile app user agent; the mobile API accepts requests the web
/// endpoints reject.
pub const MOBILE_UA: &str = "com.zhiliaoapp.musically/2023600050 (Linux; U; Android 13; en_US; Pixel 6; Build/TP1A.220624.014; Cronet/TTNetVersion:6c7b701a 2021-11-22 QuicVersion:47ac2f7f 2021-07-29)";

/// One attempt configuration in a platform's ordered fallback sequence.
#[derive(Debug, Clone)]
pub struct DownloadStrategy {
    /// Human-readable name, stamped into `DownloadResult::method_used`
    pub name: &'static str,
    /// Extractor API hostname override (TikTok regional endpoints)
    pub api_hostname: Option<&'static str>,
    /// User agent override; None keeps yt-dlp's default
    pub user_agent: Option<&'static str>,
    /// Socket timeout passed to yt-dlp; the process deadline adds a grace period
    pub socket_timeout_secs: u64,
    /// HTTP retry count inside yt-dlp
    pub retries: u32,
    /// Fragment retry count for segmented downloads
    pub fragment_retries: u32,
    /// Whether this strategy impersonates the mobile app
    pub mobile: bool,
}

impl DownloadStrategy {
    /// Extractor-args flag value for this strategy, when it overrides the
    /// API hostname.
    pub fn extractor_args(&self, platform: Platform) -> Option<String> {
        let hostname = self.api_hostname?;
        match platform {
            Platform::TikTok => Some(format!("tiktok:api_hostname={}", hostname)),
            _ => None,
        }
    }
}

/// TikTok strategy ladder: regional API endpoints with rising patience,
/// finishing with the mobile app identity. Ordered least to most permissive.
const TIKTOK_STRATEGIES: &[DownloadStrategy] = &[
    DownloadStrategy {
        name: "API v1 (US East)",
        api_hostname: Some("api16-normal-c-useast1a.tiktokv.com"),
        user_agent: Some(DESKTOP_UA),
        socket_timeout_secs: 30,
        retries: 5,
        fragment_retries: 5,
        mobile: false,
    },
    DownloadStrategy {
        name: "API v2 (Singapore)",
        api_hostname: Some("api22-normal-c-alisg.tiktokv.com"),
        user_agent: Some(DESKTOP_UA),
        socket_timeout_secs: 45,
        retries: 8,
        fragment_retries: 8,
        mobile: false,
    },
    DownloadStrategy {
        name: "API v3 (US East 2)",
        api_hostname: Some("api19-normal-c-useast2a.tiktokv.com"),
        user_agent: Some(DESKTOP_UA),
        socket_timeout_secs: 60,
        retries: 10,
        fragment_retries: 10,
        mobile: false,
    },
    DownloadStrategy {
        name: "Mobile API",
        api_hostname: Some("api16-normal-c-useast1a.tiktokv.com"),
        user_agent: Some(MOBILE_UA),
        socket_timeout_secs: 90,
        retries: 15,
        fragment_retries: 10,
        mobile: true,
    },
];

/// Single default strategy for platforms without a special table.
const DEFAULT_STRATEGY: DownloadStrategy = DownloadStrategy {
    name: "default",
    api_hostname: None,
    user_agent: None,
    socket_timeout_secs: 60,
    retries: 3,
    fragment_retries: 3,
    mobile: false,
};

/// Ordered strategy list for a platform. Always non-empty.
pub fn strategies_for(platform: Platform) -> Vec<DownloadStrategy> {
    match platform {
        Platform::TikTok => TIKTOK_STRATEGIES.to_vec(),
        _ => vec![DEFAULT_STRATEGY],
    }
}

/// yt-dlp format selector.
///
/// Audio requests take the best available audio. Video requests prefer
/// formats already under the delivery ceiling, then bounded-resolution
/// combined streams, then worst quality as the last resort.
pub fn format_selector(audio_only: bool) -> String {
    if audio_only {
        "bestaudio/best".to_string()
    } else {
        format!(
            "best[filesize<{max}M]/bv*[height<=720][filesize<{max}M]+ba/bv*[height<=480]+ba/worst",
            max = limits::MAX_FILE_MB
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_platform_has_strategies() {
        for platform in [
            Platform::Instagram,
            Platform::TikTok,
            Platform::YouTube,
            Platform::Twitter,
            Platform::Facebook,
            Platform::Other,
        ] {
            assert!(!strategies_for(platform).is_empty(), "{:?} table is empty", platform);
        }
    }

    #[test]
    fn test_tiktok_ladder_shape() {
        let strategies = strategies_for(Platform::TikTok);
        assert_eq!(strategies.len(), 4);
        assert_eq!(strategies[0].name, "API v1 (US East)");
        assert_eq!(strategies[3].name, "Mobile API");
        assert!(strategies[3].mobile);
        assert!(strategies[..3].iter().all(|s| !s.mobile));
    }

    #[test]
    fn test_tiktok_ladder_patience_increases() {
        let strategies = strategies_for(Platform::TikTok);
        for pair in strategies.windows(2) {
            assert!(pair[0].socket_timeout_secs <= pair[1].socket_timeout_secs);
            assert!(pair[0].retries <= pair[1].retries);
        }
    }

    #[test]
    fn test_default_single_strategy() {
        let strategies = strategies_for(Platform::YouTube);
        assert_eq!(strategies.len(), 1);
        assert_eq!(strategies[0].name, "default");
        assert!(strategies[0].api_hostname.is_none());
    }

    #[test]
    fn test_extractor_args_tiktok_only() {
        let strategies = strategies_for(Platform::TikTok);
        let args = strategies[1].extractor_args(Platform::TikTok).expect("tiktok args");
        assert_eq!(args, "tiktok:api_hostname=api22-normal-c-alisg.tiktokv.com");
        assert!(strategies[1].extractor_args(Platform::YouTube).is_none());
        assert!(DEFAULT_STRATEGY.extractor_args(Platform::TikTok).is_none());
    }

    #[test]
    fn test_format_selector_audio() {
        assert_eq!(format_selector(true), "bestaudio/best");
    }

    #[test]
    fn test_format_selector_video_honors_ceiling() {
        let selector = format_selector(false);
        assert!(selector.starts_with("best[filesize<50M]"));
        assert!(selector.ends_with("worst"));
        assert!(selector.contains("height<=720"));
        assert!(selector.contains("height<=480"));
    }
}
