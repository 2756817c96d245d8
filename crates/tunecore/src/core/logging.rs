//! Logging initialization and startup diagnostics
//!
//! Provides:
//! - Logger initialization (console + file)
//! - Credentials/cookies configuration check at startup

use anyhow::Result;
use simplelog::{ColorChoice, CombinedLogger, Config, LevelFilter, TermLogger, TerminalMode, WriteLogger};
use std::path::Path;

use crate::core::config;
use crate::download::cookies;

/// Initialize logger for both console and file output
pub fn init_logger(log_file_path: &str) -> Result<()> {
    let log_file =
        fs_err::File::create(log_file_path).map_err(|e| anyhow::anyhow!("Failed to create log file: {}", e))?;

    CombinedLogger::init(vec![
        TermLogger::new(
            LevelFilter::Info,
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ),
        WriteLogger::new(LevelFilter::Info, Config::default(), log_file),
    ])
    .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}

/// Logs credential configuration at startup so a misconfigured deployment is
/// obvious from the first screen of the log.
pub fn log_credentials_configuration() {
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("🎵 Tunecore startup check");
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    log_key("ACOUSTID_API_KEY", config::ACOUSTID_API_KEY.is_some());
    log_key("AUDD_API_KEY", config::AUDD_API_KEY.is_some());
    log_key(
        "SPOTIFY_CLIENT_ID / SECRET",
        config::SPOTIFY_CLIENT_ID.is_some() && config::SPOTIFY_CLIENT_SECRET.is_some(),
    );
    log_key(
        "INSTAGRAM_USERNAME / PASSWORD",
        config::INSTAGRAM_USERNAME.is_some() && config::INSTAGRAM_PASSWORD.is_some(),
    );

    match cookies::resolve_cookie_file() {
        Some(path) => log::info!("✅ cookie file: {}", path.display()),
        None => log::warn!("⚠️  cookie file not found — age-restricted and bot-checked downloads may fail"),
    }

    for (label, bin) in [
        ("yt-dlp", config::YTDL_BIN.as_str()),
        ("ffmpeg", config::FFMPEG_BIN.as_str()),
        ("fpcalc", config::FPCALC_BIN.as_str()),
    ] {
        if binary_available(bin) {
            log::info!("✅ {} binary: {}", label, bin);
        } else {
            log::warn!("⚠️  {} binary not found: {}", label, bin);
        }
    }

    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}

fn log_key(name: &str, present: bool) {
    if present {
        log::info!("✅ {}: configured", name);
    } else {
        log::warn!("⚠️  {}: missing", name);
    }
}

/// Cheap existence probe: absolute paths are stat'ed, bare names are resolved
/// against PATH.
fn binary_available(bin: &str) -> bool {
    let path = Path::new(bin);
    if path.is_absolute() || bin.contains('/') {
        return path.exists();
    }
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(bin).exists()))
        .unwrap_or(false)
}
