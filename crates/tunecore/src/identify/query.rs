//! Catalog-search query cleaning.
//!
//! Attachment filenames arrive as `tmp_voice_record_17.ogg`; searching a
//! catalog for that verbatim finds nothing. Strip the extension, drop the
//! noise tokens recorders and messengers add, and collapse the leftover
//! punctuation. Cleaning is idempotent.

use once_cell::sync::Lazy;
use regex::Regex;

static NOISE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(tmp|record|voice|audio|video|mix|file|music|song)").expect("valid regex"));

static CLUTTER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\[\]\(\)\{\}_-]+").expect("valid regex"));

static SPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").expect("valid regex"));

/// Media extensions only; stripping arbitrary dot-suffixes would mangle
/// titles like "Vol. 2" and break idempotence.
static EXTENSION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\.(mp3|mp4|wav|ogg|oga|m4a|opus|aac|flac|webm|mov|mkv|avi)$").expect("valid regex")
});

/// Clean a raw hint or filename into a catalog query.
pub fn clean_query(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let mut base = text.to_string();
    loop {
        let stripped = EXTENSION_RE.replace(&base, "").into_owned();
        if stripped == base {
            break;
        }
        base = stripped;
    }
    let base = NOISE_RE.replace_all(&base, "");
    let base = CLUTTER_RE.replace_all(&base, " ");
    let base = SPACE_RE.replace_all(&base, " ");
    base.trim().to_string()
}
