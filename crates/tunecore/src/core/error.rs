use thiserror::Error;

/// Centralized error types for the engine
///
/// All errors in the pipeline are converted to this enum for consistent error
/// handling. Uses `thiserror` for automatic conversion and display formatting.
///
/// Terminal variants (`AuthChallengeRequired`, `AuthInvalidCredentials`,
/// `ContentPrivate`) are never retried automatically; they need action from
/// the user or operator.
#[derive(Error, Debug)]
pub enum AppError {
    /// External process exited with a non-zero status
    #[error("process failed (exit code {exit_code:?}): {stderr_tail}")]
    ProcessFailure {
        exit_code: Option<i32>,
        stderr_tail: String,
    },

    /// External process exceeded its deadline and was killed
    #[error("process timed out after {secs}s")]
    ProcessTimeout { secs: u64 },

    /// Every strategy in the platform's table failed
    #[error("all download strategies exhausted, last error: {last}")]
    AllStrategiesExhausted { last: String },

    /// The platform demands manual verification (2FA / checkpoint)
    #[error("account verification required: {0}")]
    AuthChallengeRequired(String),

    /// Login rejected; wrong username/password
    #[error("login failed: {0}")]
    AuthInvalidCredentials(String),

    /// Content exists but the authenticated account may not view it
    #[error("content is private: {0}")]
    ContentPrivate(String),

    /// Content deleted, expired, or the link is wrong
    #[error("content not found: {0}")]
    ContentNotFound(String),

    /// Downloader exited cleanly but produced no output files
    #[error("downloader produced no files")]
    NoFilesProduced,

    /// FFmpeg extraction/compression failure
    #[error("transcode failed: {0}")]
    Transcode(String),

    /// A required credential or API key is missing from the environment
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    /// HTTP/Fetch errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// URL parsing errors
    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    /// JSON decoding errors (yt-dlp metadata, API responses)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Catch-all for uncategorized download errors
    #[error("download error: {0}")]
    Download(String),
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Whether this error requires user/operator action and must not be
    /// retried automatically.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppError::AuthChallengeRequired(_)
                | AppError::AuthInvalidCredentials(_)
                | AppError::ContentPrivate(_)
                | AppError::NotConfigured(_)
        )
    }

    /// Subcategory label for log lines
    pub fn subcategory(&self) -> &'static str {
        match self {
            AppError::ProcessFailure { .. } => "process",
            AppError::ProcessTimeout { .. } => "timeout",
            AppError::AllStrategiesExhausted { .. } => "strategies_exhausted",
            AppError::AuthChallengeRequired(_) => "auth_challenge",
            AppError::AuthInvalidCredentials(_) => "auth_credentials",
            AppError::ContentPrivate(_) => "content_private",
            AppError::ContentNotFound(_) => "content_not_found",
            AppError::NoFilesProduced => "no_files",
            AppError::Transcode(_) => "transcode",
            AppError::NotConfigured(_) => "not_configured",
            AppError::Http(_) => "http",
            AppError::Io(_) => "io",
            AppError::Url(_) => "url",
            AppError::Json(_) => "json",
            AppError::Download(_) => "download",
        }
    }
}

/// Plain strings become `AppError::Download`
impl From<String> for AppError {
    fn from(err: String) -> Self {
        AppError::Download(err)
    }
}

impl From<&str> for AppError {
    fn from(err: &str) -> Self {
        AppError::Download(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_errors() {
        assert!(AppError::AuthChallengeRequired("2fa".into()).is_terminal());
        assert!(AppError::AuthInvalidCredentials("bad password".into()).is_terminal());
        assert!(AppError::ContentPrivate("follow required".into()).is_terminal());
        assert!(AppError::NotConfigured("Instagram credentials").is_terminal());
        assert!(!AppError::ProcessTimeout { secs: 30 }.is_terminal());
        assert!(!AppError::NoFilesProduced.is_terminal());
        assert!(!AppError::AllStrategiesExhausted { last: "timeout".into() }.is_terminal());
    }

    #[test]
    fn test_display_includes_last_error() {
        let err = AppError::AllStrategiesExhausted {
            last: "socket timeout".into(),
        };
        assert!(err.to_string().contains("socket timeout"));
    }

    #[test]
    fn test_from_string() {
        let err: AppError = "boom".to_string().into();
        assert!(matches!(err, AppError::Download(_)));
        assert_eq!(err.subcategory(), "download");
    }
}
