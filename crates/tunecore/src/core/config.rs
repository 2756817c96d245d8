use once_cell::sync::Lazy;
use secrecy::SecretString;
use std::env;
use std::time::Duration;

/// Configuration constants for the engine
/// Cached yt-dlp binary path
/// Read once at startup from YTDL_BIN environment variable or defaults to "yt-dlp"
pub static YTDL_BIN: Lazy<String> = Lazy::new(|| env::var("YTDL_BIN").unwrap_or_else(|_| "yt-dlp".to_string()));

/// FFmpeg binary path, FFMPEG_BIN env var or "ffmpeg"
pub static FFMPEG_BIN: Lazy<String> = Lazy::new(|| env::var("FFMPEG_BIN").unwrap_or_else(|_| "ffmpeg".to_string()));

/// FFprobe binary path, FFPROBE_BIN env var or "ffprobe"
pub static FFPROBE_BIN: Lazy<String> =
    Lazy::new(|| env::var("FFPROBE_BIN").unwrap_or_else(|_| "ffprobe".to_string()));

/// Chromaprint fpcalc binary path, FPCALC_BIN env var or "fpcalc"
pub static FPCALC_BIN: Lazy<String> = Lazy::new(|| env::var("FPCALC_BIN").unwrap_or_else(|_| "fpcalc".to_string()));

/// Browser-exported cookie file passed read-only to yt-dlp
/// Read from COOKIES_FILE environment variable, defaults to cookies.txt in
/// the working directory. Tilde is expanded. The file is optional; it is
/// only forwarded when it actually exists on disk.
pub static COOKIES_FILE: Lazy<String> =
    Lazy::new(|| env::var("COOKIES_FILE").unwrap_or_else(|_| "cookies.txt".to_string()));

/// Temporary files directory for request working directories
/// Read from TEMP_FILES_DIR environment variable, defaults to /tmp
pub static TEMP_FILES_DIR: Lazy<String> =
    Lazy::new(|| env::var("TEMP_FILES_DIR").unwrap_or_else(|_| "/tmp".to_string()));

/// Log file path, LOG_FILE_PATH env var or app.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "app.log".to_string()));

/// Instagram account username for the authenticated downloader
pub static INSTAGRAM_USERNAME: Lazy<Option<String>> = Lazy::new(|| env::var("INSTAGRAM_USERNAME").ok());

/// Instagram account password. Wrapped in SecretString so it never lands in
/// Debug output or log lines.
pub static INSTAGRAM_PASSWORD: Lazy<Option<SecretString>> =
    Lazy::new(|| env::var("INSTAGRAM_PASSWORD").ok().map(SecretString::from));

/// Path of the persisted Instagram session blob
/// Read from INSTAGRAM_SESSION_FILE environment variable
pub static INSTAGRAM_SESSION_FILE: Lazy<String> =
    Lazy::new(|| env::var("INSTAGRAM_SESSION_FILE").unwrap_or_else(|_| "instagram_session.json".to_string()));

/// AcoustID API key for fingerprint lookups
pub static ACOUSTID_API_KEY: Lazy<Option<String>> = Lazy::new(|| env::var("ACOUSTID_API_KEY").ok());

/// AudD API token for the secondary recognition fallback
pub static AUDD_API_KEY: Lazy<Option<String>> = Lazy::new(|| env::var("AUDD_API_KEY").ok());

/// Spotify application credentials for catalog search
pub static SPOTIFY_CLIENT_ID: Lazy<Option<String>> = Lazy::new(|| env::var("SPOTIFY_CLIENT_ID").ok());
pub static SPOTIFY_CLIENT_SECRET: Lazy<Option<String>> = Lazy::new(|| env::var("SPOTIFY_CLIENT_SECRET").ok());

/// Delivery size ceiling configuration
pub mod limits {
    /// Maximum file size the delivery channel accepts (50 MB)
    pub const MAX_FILE_BYTES: u64 = 50 * 1024 * 1024;

    /// Same ceiling in whole megabytes, for yt-dlp format filters and probe math
    pub const MAX_FILE_MB: u64 = 50;

    /// Compression target leaves a 5 MB margin under the ceiling
    pub const COMPRESS_TARGET_MB: u64 = 45;
}

/// Download engine configuration
pub mod download {
    use super::Duration;

    /// Extra time granted on top of a strategy's socket timeout before the
    /// yt-dlp process itself is killed
    pub const GRACE_PERIOD_SECS: u64 = 30;

    /// Linear backoff unit between strategies (2s, 4s, 6s, ...)
    pub const BACKOFF_UNIT_SECS: u64 = 2;

    /// Timeout for the metadata-only size probe
    pub const PROBE_TIMEOUT_SECS: u64 = 30;

    /// Timeout for the yt-dlp cache purge between strategies
    pub const CACHE_CLEAR_TIMEOUT_SECS: u64 = 30;

    /// Zero-based strategy index before which the cache is purged once
    pub const CACHE_CLEAR_BEFORE_STRATEGY: usize = 2;

    pub fn grace_period() -> Duration {
        Duration::from_secs(GRACE_PERIOD_SECS)
    }

    pub fn backoff_unit() -> Duration {
        Duration::from_secs(BACKOFF_UNIT_SECS)
    }

    pub fn probe_timeout() -> Duration {
        Duration::from_secs(PROBE_TIMEOUT_SECS)
    }
}

/// Rate limiting configuration
pub mod rate_limit {
    use super::Duration;

    /// Maximum actions per user within one window
    pub const MAX_REQUESTS: usize = 10;

    /// Sliding window length (in seconds)
    pub const WINDOW_SECS: u64 = 60;

    pub fn window() -> Duration {
        Duration::from_secs(WINDOW_SECS)
    }
}

/// Identification chain configuration
pub mod identify {
    use super::Duration;

    /// Minimum fingerprint score accepted as final. The boundary is
    /// inclusive: exactly 0.30 is accepted.
    pub const CONFIDENCE_THRESHOLD: f64 = 0.30;

    /// Sample rate for the fingerprint normalization pass
    pub const FINGERPRINT_SAMPLE_RATE: u32 = 32_000;

    /// Fingerprinting only needs the first seconds of the clip
    pub const FINGERPRINT_CLIP_SECS: u32 = 25;

    /// Timeout for fpcalc
    pub const FPCALC_TIMEOUT_SECS: u64 = 60;

    pub fn fpcalc_timeout() -> Duration {
        Duration::from_secs(FPCALC_TIMEOUT_SECS)
    }
}

/// Transcoder configuration
pub mod transcode {
    use super::Duration;

    /// Timeout for ffmpeg operations (2 minutes)
    pub const FFMPEG_TIMEOUT_SECS: u64 = 120;

    /// Timeout for video compression passes, which re-encode the whole file
    pub const COMPRESS_TIMEOUT_SECS: u64 = 600;

    /// Timeout for ffprobe metadata queries
    pub const FFPROBE_TIMEOUT_SECS: u64 = 30;

    pub fn ffmpeg_timeout() -> Duration {
        Duration::from_secs(FFMPEG_TIMEOUT_SECS)
    }

    pub fn compress_timeout() -> Duration {
        Duration::from_secs(COMPRESS_TIMEOUT_SECS)
    }

    pub fn ffprobe_timeout() -> Duration {
        Duration::from_secs(FFPROBE_TIMEOUT_SECS)
    }
}
