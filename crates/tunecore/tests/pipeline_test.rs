//! End-to-end pipeline scenarios with a stubbed downloader.
//!
//! Run with: cargo test --test pipeline_test

use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};
use std::time::Duration;

use tunecore::core::RateLimiter;
use tunecore::download::instagram::InstagramDownloader;
use tunecore::download::ytdlp::YtDlpEngine;
use tunecore::identify::spotify::SpotifyClient;
use tunecore::identify::Identifier;
use tunecore::pipeline::{LinkOutcome, Pipeline};

static ENV_SETUP: Once = Once::new();

/// Point the lazily-read configuration at harmless values before any test
/// touches it: no real yt-dlp (the size probe must fail open, instantly) and
/// no cookie file.
fn setup_env() {
    ENV_SETUP.call_once(|| {
        std::env::set_var("YTDL_BIN", "/nonexistent/yt-dlp-test");
        std::env::set_var("COOKIES_FILE", "/nonexistent/cookies-test.txt");
    });
}

fn write_stub(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("ytdlp-stub.sh");
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).expect("write stub");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("chmod stub");
    }
    path
}

fn pipeline_with(engine: YtDlpEngine, rate_limiter: RateLimiter) -> Pipeline {
    Pipeline::with_components(
        engine,
        Arc::new(InstagramDownloader::with_credentials(
            None,
            None,
            PathBuf::from("/tmp/tunecore_test_session.json"),
        )),
        Identifier::with_spotify(SpotifyClient::with_credentials(None)),
        rate_limiter,
    )
}

/// Scenario A: a link on an unauthenticated platform with a fitting format
/// downloads on the first strategy and delivers exactly one file.
#[tokio::test]
async fn test_link_download_happy_path() {
    setup_env();
    let scratch = tempfile::tempdir().expect("tempdir");
    let stub = write_stub(scratch.path(), "printf x > media.mp4\nexit 0");

    let engine = YtDlpEngine::with_binary(stub.to_string_lossy().to_string())
        .with_backoff_unit(Duration::from_millis(5));
    let pipeline = pipeline_with(engine, RateLimiter::new());

    match pipeline.handle_link("https://example.com/clip", 11, false).await {
        LinkOutcome::Delivered(delivery) => {
            assert_eq!(delivery.files.len(), 1);
            assert_eq!(delivery.method_used.as_deref(), Some("default"));
            assert!(delivery.files[0].starts_with(delivery.work_dir()));
        }
        LinkOutcome::Rejected { message } => panic!("expected delivery, got rejection: {}", message),
    }
}

/// A failing download comes back as guidance text, not an error.
#[tokio::test]
async fn test_link_download_failure_produces_guidance() {
    setup_env();
    let scratch = tempfile::tempdir().expect("tempdir");
    let stub = write_stub(
        scratch.path(),
        "echo 'ERROR: Sign in to confirm you are not a bot' >&2\nexit 1",
    );

    let engine = YtDlpEngine::with_binary(stub.to_string_lossy().to_string())
        .with_backoff_unit(Duration::from_millis(5));
    let pipeline = pipeline_with(engine, RateLimiter::new());

    match pipeline.handle_link("https://example.com/clip", 12, false).await {
        LinkOutcome::Rejected { message } => {
            assert!(message.contains("Bot detection"), "got: {}", message);
        }
        LinkOutcome::Delivered(_) => panic!("stub always fails"),
    }
}

/// The 11th request inside the window is rejected with a positive wait time.
#[tokio::test]
async fn test_rate_limit_rejects_over_quota() {
    setup_env();
    let scratch = tempfile::tempdir().expect("tempdir");
    let stub = write_stub(scratch.path(), "printf x > media.mp4\nexit 0");

    let engine = YtDlpEngine::with_binary(stub.to_string_lossy().to_string())
        .with_backoff_unit(Duration::from_millis(5));
    let pipeline = pipeline_with(engine, RateLimiter::with_limits(10, Duration::from_secs(60)));

    for _ in 0..10 {
        match pipeline.handle_link("https://example.com/clip", 77, false).await {
            LinkOutcome::Delivered(_) => {}
            LinkOutcome::Rejected { message } => panic!("should be under quota: {}", message),
        }
    }

    match pipeline.handle_link("https://example.com/clip", 77, false).await {
        LinkOutcome::Rejected { message } => {
            assert!(message.contains("Rate limit"), "got: {}", message);
            assert!(message.contains("wait"), "got: {}", message);
        }
        LinkOutcome::Delivered(_) => panic!("11th request must be rejected"),
    }
}

/// Scenario D: a free-text query with no catalog credentials configured
/// returns a clear "not configured" message instead of failing.
#[tokio::test]
async fn test_search_without_catalog_credentials() {
    setup_env();
    let engine = YtDlpEngine::with_binary("/bin/false").with_backoff_unit(Duration::from_millis(5));
    let pipeline = pipeline_with(engine, RateLimiter::new());

    let outcome = pipeline.search_and_fetch("21 Savage redrum", 21).await;
    assert!(outcome.message.contains("not configured"), "got: {}", outcome.message);
    assert!(outcome.audio.is_none());
}

/// The audio attachment path always answers with displayable text.
#[tokio::test]
async fn test_audio_attachment_identification_degrades_gracefully() {
    setup_env();
    let engine = YtDlpEngine::with_binary("/bin/false");
    let pipeline = pipeline_with(engine, RateLimiter::new());

    let text = pipeline
        .handle_audio_attachment(Path::new("/nonexistent/voice_42.ogg"), Some("21 Savage redrum"))
        .await;
    assert!(!text.is_empty());
}
