//! Cascading audio identification.
//!
//! Chain: fingerprint match → secondary recognition API → catalog search,
//! with confidence-based fallthrough. Expressed as result-returning steps
//! rather than exception-driven control flow; every step either yields an
//! accepted outcome or passes to the next, and the top level converts any
//! unexpected fault into a catalog-suggestion message. Identification always
//! produces user-facing text, never an error.

pub mod acoustid;
pub mod audd;
pub mod musicbrainz;
pub mod query;
pub mod spotify;

use std::path::Path;

use crate::conversion;
use crate::core::config;
use crate::core::error::AppResult;
use acoustid::FingerprintCandidate;
use query::clean_query;
use spotify::{CatalogTrack, SpotifyClient};

/// Final outcome of the identification cascade.
#[derive(Debug, Clone)]
pub enum IdentificationOutcome {
    /// Fingerprint score cleared the confidence gate
    FingerprintMatch {
        score: f64,
        artist: String,
        title: String,
        recording_id: String,
    },
    /// The secondary recognition API produced a usable match
    RecognitionApiMatch {
        artist: String,
        title: String,
        link: Option<String>,
    },
    /// Catalog keyword search results (possibly empty)
    CatalogMatches(Vec<CatalogTrack>),
    NoMatch,
}

/// Whether a fingerprint score is accepted as final. The gate is inclusive:
/// exactly the threshold passes.
pub fn confidence_accepted(score: f64) -> bool {
    score >= config::identify::CONFIDENCE_THRESHOLD
}

/// Render an accepted fingerprint match.
pub(crate) fn format_fingerprint_result(artist: &str, title: &str, recording_id: &str) -> String {
    format!(
        "🎶 {} — {}\n🔗 {}",
        artist,
        title,
        musicbrainz::recording_link(recording_id)
    )
}

fn format_audd_result(artist: &str, title: &str, link: Option<&str>) -> String {
    match link {
        Some(link) => format!("🎶 {} — {}\n🔗 {}", artist, title, link),
        None => format!("🎶 {} — {}", artist, title),
    }
}

/// Query used when the chain falls back to catalog search without a
/// fingerprint hit: caller-supplied hint, or the source filename.
fn fallback_query(path: &Path, hint: Option<&str>) -> String {
    match hint {
        Some(h) if !h.trim().is_empty() => h.to_string(),
        _ => path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
    }
}

/// Identification chain front-end. One instance per process is plenty; it
/// owns the HTTP client shared by the lookup services.
pub struct Identifier {
    client: reqwest::Client,
    spotify: SpotifyClient,
}

impl Identifier {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            spotify: SpotifyClient::new(),
        }
    }

    /// Test constructor with an explicit catalog client.
    pub fn with_spotify(spotify: SpotifyClient) -> Self {
        Self {
            client: reqwest::Client::new(),
            spotify,
        }
    }

    /// The catalog client, shared with the free-text search path.
    pub fn spotify(&self) -> &SpotifyClient {
        &self.spotify
    }

    /// Identify an audio clip and render the result as user-facing text.
    ///
    /// This is the only public entry point and it cannot fail: unexpected
    /// faults anywhere in the chain degrade to a catalog-suggestion message.
    pub async fn identify_audio(&self, path: &Path, hint: Option<&str>) -> String {
        match self.run_chain(path, hint).await {
            Ok(text) => text,
            Err(e) => {
                log::error!("identification chain crashed: {}", e);
                let suggestions = self.spotify.search_message(&fallback_query(path, hint)).await;
                format!(
                    "⚠️ Identification failed, but here are catalog suggestions:\n\n{}",
                    suggestions
                )
            }
        }
    }

    /// Structured outcome, for callers that render their own text.
    pub async fn identify_outcome(&self, path: &Path, hint: Option<&str>) -> IdentificationOutcome {
        let prepared = conversion::audio::normalize_for_fingerprint(path).await;
        let candidates = self.fingerprint_candidates(&prepared).await;

        match acoustid::top_candidate(&candidates) {
            Some(top) if confidence_accepted(top.score) => IdentificationOutcome::FingerprintMatch {
                score: top.score,
                artist: top.artist.clone(),
                title: top.title.clone(),
                recording_id: top.recording_id.clone(),
            },
            _ => match self.try_audd(path).await {
                Some(m) => IdentificationOutcome::RecognitionApiMatch {
                    artist: m.artist,
                    title: m.title,
                    link: m.link,
                },
                None => {
                    let query = clean_query(&fallback_query(path, hint));
                    match self.spotify.search_tracks(&query, 5).await {
                        Ok(tracks) if !tracks.is_empty() => IdentificationOutcome::CatalogMatches(tracks),
                        _ => IdentificationOutcome::NoMatch,
                    }
                }
            },
        }
    }

    async fn run_chain(&self, path: &Path, hint: Option<&str>) -> AppResult<String> {
        log::info!("🎵 starting fingerprint scan: {}", path.display());
        let prepared = conversion::audio::normalize_for_fingerprint(path).await;

        let candidates = self.fingerprint_candidates(&prepared).await;

        let Some(top) = acoustid::top_candidate(&candidates).cloned() else {
            log::warn!("no fingerprint candidates, trying secondary recognition");
            return Ok(self.recognition_fallback(path, &fallback_query(path, hint)).await);
        };

        log::info!(
            "fingerprint match: {} — {} (score {:.2})",
            top.artist,
            top.title,
            top.score
        );

        if !confidence_accepted(top.score) {
            log::warn!("score {:.2} under the confidence gate, trying secondary recognition", top.score);
            let query = format!("{} {}", top.artist, top.title);
            return Ok(self.recognition_fallback(path, &query).await);
        }

        // Accepted: resolve canonical metadata, degrading to the raw
        // fingerprint credit when the catalog lookup fails.
        match musicbrainz::lookup_recording(&self.client, &top.recording_id).await {
            Ok(info) => Ok(format_fingerprint_result(&info.artist, &info.title, &top.recording_id)),
            Err(e) => {
                log::warn!("MusicBrainz lookup failed ({}), using fingerprint metadata", e);
                Ok(format_fingerprint_result(&top.artist, &top.title, &top.recording_id))
            }
        }
    }

    /// Fingerprint + lookup, collapsed to an empty candidate list on any
    /// failure so the chain falls through instead of aborting.
    async fn fingerprint_candidates(&self, prepared: &Path) -> Vec<FingerprintCandidate> {
        let Some(api_key) = config::ACOUSTID_API_KEY.as_ref() else {
            log::warn!("⚠️ ACOUSTID_API_KEY missing, skipping fingerprint matching");
            return Vec::new();
        };

        let fingerprint = match acoustid::fingerprint_file(prepared).await {
            Ok(fp) => fp,
            Err(e) => {
                log::error!("fpcalc failed: {}", e);
                return Vec::new();
            }
        };

        match acoustid::lookup(&self.client, api_key, &fingerprint).await {
            Ok(candidates) => candidates,
            Err(e) => {
                log::error!("AcoustID lookup failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Secondary recognition API, then catalog search. Always returns text.
    async fn recognition_fallback(&self, path: &Path, catalog_query: &str) -> String {
        if let Some(m) = self.try_audd(path).await {
            return format_audd_result(&m.artist, &m.title, m.link.as_deref());
        }
        self.spotify.search_message(catalog_query).await
    }

    /// One AudD attempt; unconfigured, unmatched, and failed requests all
    /// fall through as None.
    async fn try_audd(&self, path: &Path) -> Option<audd::AuddMatch> {
        let api_key = config::AUDD_API_KEY.as_ref()?;
        match audd::recognize(&self.client, api_key, path).await {
            Ok(Some(m)) => {
                log::info!("AudD match: {} — {}", m.artist, m.title);
                Some(m)
            }
            Ok(None) => {
                log::warn!("AudD returned no match");
                None
            }
            Err(e) => {
                log::error!("AudD request failed: {}", e);
                None
            }
        }
    }
}

impl Default for Identifier {
    fn default() -> Self {
        Self::new()
    }
}
