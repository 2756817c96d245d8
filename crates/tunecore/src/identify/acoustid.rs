//! Acoustic fingerprinting via Chromaprint + the AcoustID lookup service.
//!
//! fpcalc computes the fingerprint locally (through the process chokepoint);
//! the lookup POSTs it to AcoustID and returns score-ranked recording
//! candidates. Exactly one top candidate feeds the confidence gate; no
//! ensembling.

use serde_json::Value;
use std::path::Path;

use crate::core::error::{AppError, AppResult};
use crate::core::{config, process};

const LOOKUP_ENDPOINT: &str = "https://api.acoustid.org/v2/lookup";

/// Locally computed Chromaprint fingerprint.
#[derive(Debug, Clone)]
pub struct Fingerprint {
    pub duration_secs: u64,
    pub fingerprint: String,
}

/// One score-ranked candidate from the AcoustID database.
#[derive(Debug, Clone, PartialEq)]
pub struct FingerprintCandidate {
    pub score: f64,
    pub recording_id: String,
    pub title: String,
    pub artist: String,
}

/// Compute the fingerprint of an audio file with fpcalc.
pub async fn fingerprint_file(path: &Path) -> AppResult<Fingerprint> {
    let path_str = path.to_string_lossy().to_string();
    let args = ["-json", path_str.as_str()];
    let output = process::run_command(
        config::FPCALC_BIN.as_str(),
        &args,
        config::identify::fpcalc_timeout(),
    )
    .await?;

    let body: Value = serde_json::from_str(&output.stdout)?;
    let fingerprint = body
        .get("fingerprint")
        .and_then(|v| v.as_str())
        .ok_or_else(|| AppError::Download("fpcalc returned no fingerprint".to_string()))?
        .to_string();
    let duration_secs = body.get("duration").and_then(|v| v.as_f64()).unwrap_or(0.0) as u64;

    Ok(Fingerprint {
        duration_secs,
        fingerprint,
    })
}

/// Look a fingerprint up against AcoustID, returning candidates sorted by
/// score, best first.
pub async fn lookup(
    client: &reqwest::Client,
    api_key: &str,
    fingerprint: &Fingerprint,
) -> AppResult<Vec<FingerprintCandidate>> {
    let duration = fingerprint.duration_secs.to_string();
    let params = [
        ("client", api_key),
        ("format", "json"),
        ("meta", "recordings"),
        ("duration", duration.as_str()),
        ("fingerprint", fingerprint.fingerprint.as_str()),
    ];

    let response = client.post(LOOKUP_ENDPOINT).form(&params).send().await?;
    let body: Value = response.json().await?;

    if body.get("status").and_then(|v| v.as_str()) != Some("ok") {
        let error = body
            .pointer("/error/message")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown lookup error");
        return Err(AppError::Download(format!("AcoustID lookup failed: {}", error)));
    }

    Ok(parse_lookup_response(&body))
}

/// Flatten the lookup response into candidates. Results without recording
/// metadata are skipped; ties keep the response order.
pub(crate) fn parse_lookup_response(body: &Value) -> Vec<FingerprintCandidate> {
    let mut candidates: Vec<FingerprintCandidate> = Vec::new();
    let Some(results) = body.get("results").and_then(|v| v.as_array()) else {
        return candidates;
    };

    for result in results {
        let Some(score) = result.get("score").and_then(|v| v.as_f64()) else {
            continue;
        };
        let Some(recordings) = result.get("recordings").and_then(|v| v.as_array()) else {
            continue;
        };
        for recording in recordings {
            let Some(id) = recording.get("id").and_then(|v| v.as_str()) else {
                continue;
            };
            let title = recording.get("title").and_then(|v| v.as_str()).unwrap_or("").to_string();
            let artist = recording
                .pointer("/artists/0/name")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            candidates.push(FingerprintCandidate {
                score,
                recording_id: id.to_string(),
                title,
                artist,
            });
        }
    }

    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    candidates
}

/// The single top-scored candidate, if any.
pub fn top_candidate(candidates: &[FingerprintCandidate]) -> Option<&FingerprintCandidate> {
    candidates.first()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn lookup_fixture() -> Value {
        json!({
            "status": "ok",
            "results": [
                {
                    "score": 0.62,
                    "id": "result-low",
                    "recordings": [
                        { "id": "rec-low", "title": "B Side", "artists": [{ "name": "Artist B" }] }
                    ]
                },
                {
                    "score": 0.85,
                    "id": "result-high",
                    "recordings": [
                        { "id": "abc123", "title": "Title Y", "artists": [{ "name": "Artist X" }] }
                    ]
                }
            ]
        })
    }

    #[test]
    fn test_parse_lookup_sorted_by_score() {
        let candidates = parse_lookup_response(&lookup_fixture());
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].recording_id, "abc123");
        assert_eq!(candidates[0].artist, "Artist X");
        assert_eq!(candidates[0].title, "Title Y");
        assert!((candidates[0].score - 0.85).abs() < 1e-9);
        assert_eq!(candidates[1].recording_id, "rec-low");
    }

    #[test]
    fn test_parse_lookup_skips_resultless_entries() {
        let body = json!({
            "status": "ok",
            "results": [
                { "score": 0.9, "id": "no-recordings" },
                { "id": "no-score", "recordings": [{ "id": "x", "title": "t" }] }
            ]
        });
        assert!(parse_lookup_response(&body).is_empty());
    }

    #[test]
    fn test_parse_lookup_empty_response() {
        assert!(parse_lookup_response(&json!({ "status": "ok", "results": [] })).is_empty());
        assert!(parse_lookup_response(&json!({})).is_empty());
    }

    #[test]
    fn test_top_candidate() {
        let candidates = parse_lookup_response(&lookup_fixture());
        assert_eq!(top_candidate(&candidates).map(|c| c.recording_id.as_str()), Some("abc123"));
        assert_eq!(top_candidate(&[]), None);
    }

    #[tokio::test]
    async fn test_fingerprint_file_missing_binary_errors() {
        // FPCALC_BIN defaults to "fpcalc" which may exist; point the test at
        // a file that cannot be fingerprinted either way.
        let result = fingerprint_file(Path::new("/nonexistent/clip_42.wav")).await;
        assert!(result.is_err());
    }
}
