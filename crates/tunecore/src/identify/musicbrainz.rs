//! MusicBrainz recording lookups.
//!
//! Resolves the canonical artist/title for a recording id returned by
//! fingerprint matching. Lookup failures are survivable; the chain degrades
//! to the raw fingerprint metadata.

use serde_json::Value;

use crate::core::error::{AppError, AppResult};

const API_BASE: &str = "https://musicbrainz.org/ws/2";

/// MusicBrainz asks clients to identify themselves.
const USER_AGENT: &str = "tunecore/0.4 (https://musicbrainz.org)";

/// Canonical recording metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingInfo {
    pub artist: String,
    pub title: String,
    pub link: String,
}

/// Public permalink for a recording id.
pub fn recording_link(recording_id: &str) -> String {
    format!("https://musicbrainz.org/recording/{}", recording_id)
}

/// Fetch canonical artist/title for a recording.
pub async fn lookup_recording(client: &reqwest::Client, recording_id: &str) -> AppResult<RecordingInfo> {
    let endpoint = format!(
        "{}/recording/{}?fmt=json&inc=artists",
        API_BASE,
        urlencoding::encode(recording_id)
    );

    let response = client
        .get(&endpoint)
        .header("User-Agent", USER_AGENT)
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(AppError::Download(format!(
            "MusicBrainz returned HTTP {}",
            response.status()
        )));
    }

    let body: Value = response.json().await?;
    parse_recording(&body, recording_id)
}

/// Extract artist/title from a recording response.
pub(crate) fn parse_recording(body: &Value, recording_id: &str) -> AppResult<RecordingInfo> {
    let title = body
        .get("title")
        .and_then(|v| v.as_str())
        .ok_or_else(|| AppError::Download("MusicBrainz recording has no title".to_string()))?
        .to_string();

    let artist = body
        .pointer("/artist-credit/0/artist/name")
        .or_else(|| body.pointer("/artist-credit/0/name"))
        .and_then(|v| v.as_str())
        .ok_or_else(|| AppError::Download("MusicBrainz recording has no artist credit".to_string()))?
        .to_string();

    Ok(RecordingInfo {
        artist,
        title,
        link: recording_link(recording_id),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_recording() {
        let body = json!({
            "title": "Title Y",
            "artist-credit": [
                { "name": "Artist X feat. Z", "artist": { "name": "Artist X" } }
            ]
        });
        let info = parse_recording(&body, "abc123").expect("parse");
        assert_eq!(info.artist, "Artist X");
        assert_eq!(info.title, "Title Y");
        assert_eq!(info.link, "https://musicbrainz.org/recording/abc123");
    }

    #[test]
    fn test_parse_recording_falls_back_to_credit_name() {
        let body = json!({
            "title": "Title Y",
            "artist-credit": [ { "name": "Artist X" } ]
        });
        let info = parse_recording(&body, "abc123").expect("parse");
        assert_eq!(info.artist, "Artist X");
    }

    #[test]
    fn test_parse_recording_missing_fields() {
        assert!(parse_recording(&json!({}), "abc").is_err());
        assert!(parse_recording(&json!({ "title": "T" }), "abc").is_err());
    }

    #[test]
    fn test_recording_link() {
        assert_eq!(recording_link("abc123"), "https://musicbrainz.org/recording/abc123");
    }
}
