//! Secondary recognition via the AudD API (Shazam-style matching).
//!
//! Used when fingerprint matching finds nothing or scores below the
//! confidence gate. Uploads the raw audio as multipart form data and gets a
//! single artist/title back, with a Spotify permalink when AudD has one.

use serde_json::Value;
use std::path::Path;

use crate::core::error::{AppError, AppResult};

const API_ENDPOINT: &str = "https://api.audd.io/";

/// A usable AudD match.
#[derive(Debug, Clone, PartialEq)]
pub struct AuddMatch {
    pub artist: String,
    pub title: String,
    pub link: Option<String>,
}

/// Recognize a clip. `Ok(None)` means AudD answered but found no match.
pub async fn recognize(client: &reqwest::Client, api_key: &str, path: &Path) -> AppResult<Option<AuddMatch>> {
    let bytes = fs_err::tokio::read(path).await?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "clip.mp3".to_string());

    let part = reqwest::multipart::Part::bytes(bytes)
        .file_name(file_name)
        .mime_str("audio/mpeg")?;
    let form = reqwest::multipart::Form::new()
        .text("api_token", api_key.to_string())
        .text("return", "spotify")
        .part("file", part);

    let response = client.post(API_ENDPOINT).multipart(form).send().await?;
    let body: Value = response.json().await?;

    if body.get("status").and_then(|v| v.as_str()) == Some("error") {
        let message = body
            .pointer("/error/error_message")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown AudD error");
        return Err(AppError::Download(format!("AudD request failed: {}", message)));
    }

    Ok(parse_response(&body))
}

/// Pull the match out of an AudD response; `result: null` means no match.
pub(crate) fn parse_response(body: &Value) -> Option<AuddMatch> {
    let result = body.get("result")?;
    if result.is_null() {
        return None;
    }
    let artist = result.get("artist")?.as_str()?.to_string();
    let title = result.get("title")?.as_str()?.to_string();
    let link = result
        .pointer("/spotify/external_urls/spotify")
        .and_then(|v| v.as_str())
        .map(String::from);
    Some(AuddMatch { artist, title, link })
}
