//! Spotify catalog search: the last identification fallback.
//!
//! Uses the client-credentials flow (no user login) with an in-process token
//! cache. Every public entry point degrades to a user-displayable message:
//! missing credentials, an empty query, or zero matches are all answers, not
//! errors.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::identify::query::clean_query;

const TOKEN_ENDPOINT: &str = "https://accounts.spotify.com/api/token";
const SEARCH_ENDPOINT: &str = "https://api.spotify.com/v1/search";

/// Shown when SPOTIFY_CLIENT_ID / SECRET are absent.
pub const NOT_CONFIGURED_MESSAGE: &str = "⚠️ Spotify search is not configured.";
const NO_QUERY_MESSAGE: &str = "😕 No search query available.";
const NO_MATCHES_MESSAGE: &str = "😕 No Spotify matches found.";

/// One track from a catalog search.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogTrack {
    pub artist: String,
    pub title: String,
    pub link: String,
}

struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Spotify client with credential-derived bearer token caching.
pub struct SpotifyClient {
    client: reqwest::Client,
    credentials: Option<(String, String)>,
    token: Mutex<Option<CachedToken>>,
}

impl SpotifyClient {
    pub fn new() -> Self {
        let credentials = match (config::SPOTIFY_CLIENT_ID.clone(), config::SPOTIFY_CLIENT_SECRET.clone()) {
            (Some(id), Some(secret)) => Some((id, secret)),
            _ => None,
        };
        Self::with_credentials(credentials)
    }

    /// Explicit credentials. Used by tests.
    pub fn with_credentials(credentials: Option<(String, String)>) -> Self {
        Self {
            client: reqwest::Client::new(),
            credentials,
            token: Mutex::new(None),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }

    /// Search the catalog; ranked track list, best match first.
    pub async fn search_tracks(&self, query: &str, limit: u8) -> AppResult<Vec<CatalogTrack>> {
        let token = self.access_token().await?;

        let limit = limit.to_string();
        let response = self
            .client
            .get(SEARCH_ENDPOINT)
            .bearer_auth(token)
            .query(&[("q", query), ("type", "track"), ("limit", limit.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::Download(format!(
                "Spotify search returned HTTP {}",
                response.status()
            )));
        }

        let body: Value = response.json().await?;
        Ok(parse_search_response(&body))
    }

    /// Search and render a user-displayable message. Never fails: missing
    /// configuration, empty queries, no matches, and transport errors all
    /// collapse into text.
    pub async fn search_message(&self, raw_query: &str) -> String {
        if !self.is_configured() {
            return NOT_CONFIGURED_MESSAGE.to_string();
        }
        let query = clean_query(raw_query);
        if query.is_empty() {
            return NO_QUERY_MESSAGE.to_string();
        }
        match self.search_tracks(&query, 5).await {
            Ok(tracks) if tracks.is_empty() => NO_MATCHES_MESSAGE.to_string(),
            Ok(tracks) => format_matches(&tracks),
            Err(e) => {
                log::error!("Spotify search failed: {}", e);
                format!("⚠️ Spotify search error: {}", e)
            }
        }
    }

    /// Cached client-credentials token, refreshed when within a minute of
    /// expiry.
    async fn access_token(&self) -> AppResult<String> {
        let (id, secret) = self
            .credentials
            .as_ref()
            .ok_or(AppError::NotConfigured("Spotify credentials"))?;

        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Utc::now() + ChronoDuration::seconds(60) {
                return Ok(token.token.clone());
            }
        }

        let basic = BASE64.encode(format!("{}:{}", id, secret));
        let response = self
            .client
            .post(TOKEN_ENDPOINT)
            .header("Authorization", format!("Basic {}", basic))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::Download(format!(
                "Spotify token request returned HTTP {}",
                response.status()
            )));
        }

        let body: Value = response.json().await?;
        let token = body
            .get("access_token")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AppError::Download("Spotify token response has no access_token".to_string()))?
            .to_string();
        let expires_in = body.get("expires_in").and_then(|v| v.as_i64()).unwrap_or(3600);

        *cached = Some(CachedToken {
            token: token.clone(),
            expires_at: Utc::now() + ChronoDuration::seconds(expires_in),
        });
        Ok(token)
    }
}

impl Default for SpotifyClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Flatten a search response into tracks.
pub(crate) fn parse_search_response(body: &Value) -> Vec<CatalogTrack> {
    let Some(items) = body.pointer("/tracks/items").and_then(|v| v.as_array()) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|track| {
            Some(CatalogTrack {
                artist: track.pointer("/artists/0/name")?.as_str()?.to_string(),
                title: track.get("name")?.as_str()?.to_string(),
                link: track
                    .pointer("/external_urls/spotify")
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string(),
            })
        })
        .collect()
}

/// Render the match list the way the chat adapter displays it.
pub(crate) fn format_matches(tracks: &[CatalogTrack]) -> String {
    let mut message = String::from("🎧 Closest matches on Spotify:\n\n");
    for track in tracks {
        message.push_str(&format!("• {} — {}\n", track.artist, track.title));
        if !track.link.is_empty() {
            message.push_str(&format!("🔗 {}\n", track.link));
        }
        message.push('\n');
    }
    message.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_search_response() {
        let body = json!({ "tracks": { "items": [
            {
                "name": "redrum",
                "artists": [{ "name": "21 Savage" }],
                "external_urls": { "spotify": "https://open.spotify.com/track/t1" }
            },
            {
                "name": "Other",
                "artists": [{ "name": "Someone" }],
                "external_urls": {}
            }
        ]}});
        let tracks = parse_search_response(&body);
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].artist, "21 Savage");
        assert_eq!(tracks[0].title, "redrum");
        assert_eq!(tracks[0].link, "https://open.spotify.com/track/t1");
        assert_eq!(tracks[1].link, "");
    }

    #[test]
    fn test_parse_search_response_empty() {
        assert!(parse_search_response(&json!({})).is_empty());
        assert!(parse_search_response(&json!({ "tracks": { "items": [] } })).is_empty());
    }

    #[test]
    fn test_format_matches() {
        let tracks = vec![CatalogTrack {
            artist: "21 Savage".to_string(),
            title: "redrum".to_string(),
            link: "https://open.spotify.com/track/t1".to_string(),
        }];
        let message = format_matches(&tracks);
        assert!(message.contains("21 Savage — redrum"));
        assert!(message.contains("https://open.spotify.com/track/t1"));
    }

    #[tokio::test]
    async fn test_search_message_not_configured() {
        let spotify = SpotifyClient::with_credentials(None);
        let message = spotify.search_message("21 Savage redrum").await;
        assert_eq!(message, NOT_CONFIGURED_MESSAGE);
        assert!(message.contains("not configured"));
    }

    #[tokio::test]
    async fn test_search_message_empty_query() {
        let spotify = SpotifyClient::with_credentials(Some(("id".into(), "secret".into())));
        // Everything in this hint is noise, so the cleaned query is empty and
        // no network call happens.
        let message = spotify.search_message("tmp_audio_file.mp3").await;
        assert_eq!(message, NO_QUERY_MESSAGE);
    }

    #[tokio::test]
    async fn test_search_tracks_unconfigured_errors() {
        let spotify = SpotifyClient::with_credentials(None);
        let err = spotify.search_tracks("query", 5).await.expect_err("no creds");
        assert!(matches!(err, AppError::NotConfigured(_)));
    }
}
