//! Authenticated Instagram downloader with session persistence.
//!
//! Owns the process-wide Instagram session: the serialized login state is
//! kept in a JSON blob on disk so restarts reuse the login instead of
//! repeating the credential exchange (repeated logins are what trips
//! Instagram's anti-automation defenses). The authenticate-or-refresh
//! transition is serialized behind an async mutex; under concurrent
//! first-time callers exactly one login flow runs and the rest reuse the
//! just-established session.
//!
//! Content handlers cover the three URL shapes: single posts/reels,
//! multi-item carousels (every item is downloaded), and ephemeral stories
//! (resolved against the active story tray, expired items reported as
//! not found).

use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, SET_COOKIE};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::Mutex;
use url::Url;

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::download::{platform::Platform, DownloadResult};

/// Instagram internal app ID (public, embedded in the web app).
const IG_APP_ID: &str = "936619743392459";

/// Mobile API user agent accepted by the i.instagram.com endpoints.
const IG_USER_AGENT: &str = "Instagram 275.0.0.27.98 Android";

const LOGIN_PAGE: &str = "https://www.instagram.com/accounts/login/";
const LOGIN_ENDPOINT: &str = "https://www.instagram.com/api/v1/web/accounts/login/ajax/";
const API_BASE: &str = "https://i.instagram.com/api/v1";

/// Serialized authentication state persisted between runs. Opaque to the
/// rest of the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionBlob {
    pub username: String,
    pub user_id: Option<String>,
    pub csrf_token: String,
    pub session_id: String,
    pub device_id: String,
    pub created_at: DateTime<Utc>,
}

impl SessionBlob {
    /// Cookie header value for authenticated API calls.
    fn cookie_header(&self) -> String {
        format!("sessionid={}; csrftoken={}", self.session_id, self.csrf_token)
    }
}

/// In-memory session state guarded by the auth mutex.
#[derive(Default)]
struct AuthSession {
    authenticated: bool,
    blob: Option<SessionBlob>,
}

/// Process-lifetime Instagram downloader. One logical session per process;
/// construct once and share behind an `Arc`.
pub struct InstagramDownloader {
    client: reqwest::Client,
    username: Option<String>,
    password: Option<SecretString>,
    session_file: PathBuf,
    session: Mutex<AuthSession>,
    login_flows: AtomicU32,
}

impl InstagramDownloader {
    /// Build from environment configuration.
    pub fn new() -> Self {
        let password = config::INSTAGRAM_PASSWORD
            .as_ref()
            .map(|p| SecretString::from(p.expose_secret().to_string()));
        Self::with_credentials(
            config::INSTAGRAM_USERNAME.clone(),
            password,
            PathBuf::from(config::INSTAGRAM_SESSION_FILE.as_str()),
        )
    }

    /// Build with explicit credentials and session path. Used by tests.
    pub fn with_credentials(
        username: Option<String>,
        password: Option<SecretString>,
        session_file: PathBuf,
    ) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(IG_USER_AGENT)
            .timeout(std::time::Duration::from_secs(60))
            .connect_timeout(std::time::Duration::from_secs(15))
            .build()
            .unwrap_or_default();

        Self {
            client,
            username,
            password,
            session_file,
            session: Mutex::new(AuthSession::default()),
            login_flows: AtomicU32::new(0),
        }
    }

    /// How many fresh login flows this process has started. Diagnostic; the
    /// value stays at one per session-invalidation event even under
    /// concurrent callers.
    pub fn login_flow_count(&self) -> u32 {
        self.login_flows.load(Ordering::SeqCst)
    }

    /// Download any supported Instagram content into the working directory.
    pub async fn download_content(&self, url: &str, working_dir: &Path) -> AppResult<DownloadResult> {
        self.ensure_authenticated().await?;

        let parsed = Url::parse(url)?;
        let path = parsed.path();
        let result = if path.contains("/stories/") || path.starts_with("/s/") {
            self.download_story(&parsed, working_dir).await
        } else {
            self.download_post(&parsed, working_dir).await
        };

        match result {
            Ok(r) => Ok(r),
            // Privacy restrictions are a terminal, explained failure; not a
            // retriable error.
            Err(AppError::ContentPrivate(msg)) => Ok(DownloadResult::failed(Platform::Instagram, msg)),
            Err(e) => Err(e),
        }
    }

    // ── Session lifecycle ───────────────────────────────────────────────

    /// Load-or-login. Serialized: concurrent callers queue on the session
    /// mutex, and the double-check after acquisition means followers reuse
    /// the session the first caller established.
    pub async fn ensure_authenticated(&self) -> AppResult<()> {
        let mut session = self.session.lock().await;
        if session.authenticated {
            return Ok(());
        }

        if let Some(blob) = self.load_session_blob() {
            if self.verify_session(&blob).await {
                log::info!("✅ loaded existing Instagram session for {}", blob.username);
                session.blob = Some(blob);
                session.authenticated = true;
                return Ok(());
            }
            log::warn!("⚠️ stored Instagram session is stale, discarding");
            let _ = fs_err::remove_file(&self.session_file);
        }

        log::info!("🔐 creating new Instagram session...");
        self.login_flows.fetch_add(1, Ordering::SeqCst);
        let blob = self.login().await?;
        self.save_session_blob(&blob)?;
        log::info!("✅ created and saved new Instagram session for {}", blob.username);
        session.blob = Some(blob);
        session.authenticated = true;
        Ok(())
    }

    fn load_session_blob(&self) -> Option<SessionBlob> {
        let raw = fs_err::read_to_string(&self.session_file).ok()?;
        match serde_json::from_str(&raw) {
            Ok(blob) => Some(blob),
            Err(e) => {
                log::warn!("⚠️ session blob is unreadable: {}", e);
                None
            }
        }
    }

    fn save_session_blob(&self, blob: &SessionBlob) -> AppResult<()> {
        let raw = serde_json::to_string_pretty(blob)?;
        let mut file = fs_err::File::create(&self.session_file)?;
        file.write_all(raw.as_bytes())?;
        Ok(())
    }

    /// Cheap liveness probe: fetch the current user with the stored cookies.
    async fn verify_session(&self, blob: &SessionBlob) -> bool {
        let endpoint = format!("{}/accounts/current_user/", API_BASE);
        let response = self
            .client
            .get(&endpoint)
            .header("X-IG-App-ID", IG_APP_ID)
            .header("Cookie", blob.cookie_header())
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                let body: Value = resp.json().await.unwrap_or_default();
                body.get("status").and_then(|v| v.as_str()) == Some("ok")
            }
            Ok(resp) => {
                log::warn!("⚠️ session liveness check returned HTTP {}", resp.status());
                false
            }
            Err(e) => {
                log::warn!("⚠️ session liveness check failed: {}", e);
                false
            }
        }
    }

    /// Fresh credential exchange via the web login endpoint.
    ///
    /// Challenge/verification requirements and invalid credentials are
    /// terminal; the operator has to act, automatic retries only make the
    /// account look more suspicious.
    async fn login(&self) -> AppResult<SessionBlob> {
        let (Some(username), Some(password)) = (self.username.as_ref(), self.password.as_ref()) else {
            return Err(AppError::NotConfigured("Instagram credentials"));
        };

        // Prime a csrf token from the login page cookies.
        let page = self.client.get(LOGIN_PAGE).send().await?;
        let csrf_token = extract_cookie(page.headers(), "csrftoken")
            .ok_or_else(|| AppError::AuthInvalidCredentials("no csrf token issued".to_string()))?;

        let enc_password = format!(
            "#PWD_INSTAGRAM_BROWSER:0:{}:{}",
            Utc::now().timestamp(),
            password.expose_secret()
        );

        let response = self
            .client
            .post(LOGIN_ENDPOINT)
            .header("X-CSRFToken", &csrf_token)
            .header("X-IG-App-ID", IG_APP_ID)
            .header("Referer", LOGIN_PAGE)
            .form(&[
                ("username", username.as_str()),
                ("enc_password", enc_password.as_str()),
                ("optIntoOneTap", "false"),
            ])
            .send()
            .await?;

        let headers = response.headers().clone();
        let body: Value = response.json().await?;

        if let Some(message) = body.get("message").and_then(|v| v.as_str()) {
            if message.contains("checkpoint") {
                return Err(AppError::AuthChallengeRequired(
                    "Instagram requires verification. Complete the challenge in the app, then restart.".to_string(),
                ));
            }
        }
        if body.get("two_factor_required").and_then(|v| v.as_bool()) == Some(true) {
            return Err(AppError::AuthChallengeRequired(
                "Instagram requires 2FA verification. Please verify in the app first.".to_string(),
            ));
        }
        if body.get("authenticated").and_then(|v| v.as_bool()) != Some(true) {
            return Err(AppError::AuthInvalidCredentials(
                "Instagram login failed. Check credentials.".to_string(),
            ));
        }

        let session_id = extract_cookie(&headers, "sessionid")
            .ok_or_else(|| AppError::AuthInvalidCredentials("login succeeded but no session cookie".to_string()))?;
        let csrf_token = extract_cookie(&headers, "csrftoken").unwrap_or(csrf_token);
        let user_id = body
            .pointer("/userId")
            .or_else(|| body.pointer("/user_id"))
            .map(json_value_to_string);

        Ok(SessionBlob {
            username: username.clone(),
            user_id,
            csrf_token,
            session_id,
            device_id: derive_device_id(username),
            created_at: Utc::now(),
        })
    }

    // ── Content handlers ────────────────────────────────────────────────

    /// Posts, reels, and carousels; routed by the media type in the API
    /// response, not by the URL flavor.
    async fn download_post(&self, url: &Url, working_dir: &Path) -> AppResult<DownloadResult> {
        let shortcode = extract_shortcode(url)
            .ok_or_else(|| AppError::ContentNotFound("cannot extract a post id from this link".to_string()))?;
        let media_pk = media_pk_from_shortcode(&shortcode)
            .ok_or_else(|| AppError::ContentNotFound(format!("malformed post id: {}", shortcode)))?;

        let info = self.fetch_media_info(media_pk).await?;
        log::info!(
            "⬇️ Instagram {} by @{} ({} item(s))",
            info.kind(),
            info.username,
            info.items.len()
        );

        let mut paths = Vec::new();
        for (index, item) in info.items.iter().enumerate() {
            let ext = if item.is_video { "mp4" } else { "jpg" };
            let file_name = if info.items.len() > 1 {
                format!("{}_{:02}.{}", shortcode, index + 1, ext)
            } else {
                format!("{}.{}", shortcode, ext)
            };
            let target = working_dir.join(file_name);
            self.download_media_url(&item.media_url, &target).await?;
            paths.push(target);
        }

        if paths.is_empty() {
            return Err(AppError::NoFilesProduced);
        }

        let method = format!("instagram_{}", info.kind());
        Ok(DownloadResult::succeeded(Platform::Instagram, paths, &method).with_caption(info.caption_with_engagement()))
    }

    /// Ephemeral stories: resolve the story id against the owner's active
    /// tray; an id that is no longer in the tray has expired.
    async fn download_story(&self, url: &Url, working_dir: &Path) -> AppResult<DownloadResult> {
        let story_ref = parse_story_ref(url)
            .ok_or_else(|| AppError::ContentNotFound("story link not recognized or expired".to_string()))?;

        let user_id = self.resolve_user_id(&story_ref.username).await?;
        let endpoint = format!("{}/feed/user/{}/story/", API_BASE, user_id);
        let body = self.api_get(&endpoint).await?;

        let items = body.pointer("/reel/items").and_then(|v| v.as_array());
        let Some(items) = items else {
            return Err(AppError::ContentNotFound("story not found or expired".to_string()));
        };

        let story = items
            .iter()
            .find(|item| {
                item.get("pk")
                    .map(json_value_to_string)
                    .map(|pk| pk == story_ref.story_pk)
                    .unwrap_or(false)
            })
            .ok_or_else(|| AppError::ContentNotFound("story not found or expired".to_string()))?;

        let item = parse_media_item(story)
            .ok_or_else(|| AppError::ContentNotFound("story has no downloadable media".to_string()))?;

        let ext = if item.is_video { "mp4" } else { "jpg" };
        let target = working_dir.join(format!("story_{}.{}", story_ref.story_pk, ext));
        self.download_media_url(&item.media_url, &target).await?;

        Ok(
            DownloadResult::succeeded(Platform::Instagram, vec![target], "instagram_story")
                .with_caption(format!("Story by @{}", story_ref.username)),
        )
    }

    // ── HTTP plumbing ───────────────────────────────────────────────────

    /// Authenticated GET against the private API, with stale-session and
    /// privacy classification.
    async fn api_get(&self, endpoint: &str) -> AppResult<Value> {
        let cookie = {
            let session = self.session.lock().await;
            session
                .blob
                .as_ref()
                .map(|b| b.cookie_header())
                .ok_or_else(|| AppError::NotConfigured("Instagram session"))?
        };

        let response = self
            .client
            .get(endpoint)
            .header("X-IG-App-ID", IG_APP_ID)
            .header("Cookie", cookie)
            .send()
            .await?;

        let status = response.status();
        let body: Value = response.json().await.unwrap_or_default();

        let message = body.get("message").and_then(|v| v.as_str()).unwrap_or("");
        if message.contains("login_required") || status.as_u16() == 401 {
            return Err(AppError::ContentPrivate(
                "This content is not accessible. The bot account must follow this user first.".to_string(),
            ));
        }
        if message.contains("Not authorized") || message.contains("private") {
            return Err(AppError::ContentPrivate(
                "Private account. Follow the account with the bot's credentials first.".to_string(),
            ));
        }
        if status.as_u16() == 404 || message.contains("Media not found") {
            return Err(AppError::ContentNotFound("post deleted or unavailable".to_string()));
        }
        if !status.is_success() {
            return Err(AppError::Download(format!("Instagram API returned HTTP {}", status)));
        }

        Ok(body)
    }

    async fn fetch_media_info(&self, media_pk: u128) -> AppResult<MediaInfo> {
        let endpoint = format!("{}/media/{}/info/", API_BASE, media_pk);
        let body = self.api_get(&endpoint).await?;
        parse_media_info(&body)
    }

    async fn resolve_user_id(&self, username: &str) -> AppResult<String> {
        let endpoint = format!(
            "{}/users/web_profile_info/?username={}",
            API_BASE,
            urlencoding::encode(username)
        );
        let body = self.api_get(&endpoint).await?;
        body.pointer("/data/user/id")
            .map(json_value_to_string)
            .ok_or_else(|| AppError::ContentNotFound(format!("user @{} not found", username)))
    }

    /// Stream one media URL to a file.
    async fn download_media_url(&self, media_url: &str, target: &Path) -> AppResult<()> {
        let response = self.client.get(media_url).send().await?;
        if !response.status().is_success() {
            return Err(AppError::Download(format!(
                "media download returned HTTP {}",
                response.status()
            )));
        }

        let mut file = fs_err::File::create(target)?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk)?;
        }
        file.flush()?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) async fn force_authenticated(&self, blob: SessionBlob) {
        let mut session = self.session.lock().await;
        session.blob = Some(blob);
        session.authenticated = true;
    }
}

impl Default for InstagramDownloader {
    fn default() -> Self {
        Self::new()
    }
}

// ── Parsing helpers (pure, unit-tested) ─────────────────────────────────

/// One downloadable item inside a post or story.
#[derive(Debug, Clone)]
struct MediaItem {
    is_video: bool,
    media_url: String,
}

/// Parsed media info for a post, reel, or carousel.
#[derive(Debug)]
struct MediaInfo {
    items: Vec<MediaItem>,
    media_type: u64,
    caption: String,
    username: String,
    like_count: Option<u64>,
    comment_count: Option<u64>,
}

impl MediaInfo {
    fn kind(&self) -> &'static str {
        match self.media_type {
            8 => "carousel",
            2 => "reel",
            _ => "post",
        }
    }

    /// Caption plus engagement metadata when the API exposes it.
    fn caption_with_engagement(&self) -> String {
        let mut caption = if self.caption.is_empty() {
            format!("Instagram {} by @{}", self.kind(), self.username)
        } else {
            self.caption.clone()
        };
        if let (Some(likes), Some(comments)) = (self.like_count, self.comment_count) {
            caption.push_str(&format!("\n\n❤️ {}  💬 {}", likes, comments));
        }
        caption
    }
}

/// Extract the shortcode from a content URL.
///
/// Supports `/p/<code>/`, `/reel/<code>/`, `/reels/<code>/`, `/tv/<code>/`
/// and the username-prefixed `/<user>/p/<code>/` variants.
fn extract_shortcode(url: &Url) -> Option<String> {
    let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
    const CONTENT_TYPES: &[&str] = &["p", "reel", "reels", "tv"];
    if segments.len() >= 2 && CONTENT_TYPES.contains(&segments[0]) {
        return Some(segments[1].to_string());
    }
    if segments.len() >= 3 && CONTENT_TYPES.contains(&segments[1]) {
        return Some(segments[2].to_string());
    }
    None
}

/// Shortcode alphabet used by Instagram's base64 media-pk encoding.
const SHORTCODE_ALPHABET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

/// Decode a shortcode into the numeric media pk used by the private API.
fn media_pk_from_shortcode(shortcode: &str) -> Option<u128> {
    // Long shared codes embed the pk in the first 11 characters.
    let code: String = shortcode.chars().take(11).collect();
    let mut pk: u128 = 0;
    for ch in code.chars() {
        let index = SHORTCODE_ALPHABET.find(ch)? as u128;
        pk = pk.checked_mul(64)?.checked_add(index)?;
    }
    Some(pk)
}

/// A `/stories/<username>/<pk>/` reference.
#[derive(Debug, PartialEq)]
struct StoryRef {
    username: String,
    story_pk: String,
}

fn parse_story_ref(url: &Url) -> Option<StoryRef> {
    let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
    if segments.len() < 3 || segments[0] != "stories" {
        return None;
    }
    let story_pk: String = segments[2].chars().take_while(|c| c.is_ascii_digit()).collect();
    if story_pk.is_empty() {
        return None;
    }
    Some(StoryRef {
        username: segments[1].to_string(),
        story_pk,
    })
}

/// Pick the best media URL out of one API item (video_versions for videos,
/// image candidates otherwise).
fn parse_media_item(item: &Value) -> Option<MediaItem> {
    let media_type = item.get("media_type").and_then(|v| v.as_u64()).unwrap_or(1);
    let is_video = media_type == 2;
    let media_url = if is_video {
        item.pointer("/video_versions/0/url")?.as_str()?.to_string()
    } else {
        item.pointer("/image_versions2/candidates/0/url")?.as_str()?.to_string()
    };
    Some(MediaItem { is_video, media_url })
}

/// Parse the `/media/{pk}/info/` response into items + metadata.
/// Carousels (media_type 8) contribute every child item, in order.
fn parse_media_info(body: &Value) -> AppResult<MediaInfo> {
    let item = body
        .pointer("/items/0")
        .ok_or_else(|| AppError::ContentNotFound("post not found or media unavailable".to_string()))?;

    let media_type = item.get("media_type").and_then(|v| v.as_u64()).unwrap_or(1);
    let items = if media_type == 8 {
        item.get("carousel_media")
            .and_then(|v| v.as_array())
            .map(|children| children.iter().filter_map(parse_media_item).collect())
            .unwrap_or_default()
    } else {
        parse_media_item(item).into_iter().collect::<Vec<_>>()
    };

    if items.is_empty() {
        return Err(AppError::ContentNotFound("no downloadable media in post".to_string()));
    }

    Ok(MediaInfo {
        items,
        media_type,
        caption: item
            .pointer("/caption/text")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string(),
        username: item
            .pointer("/user/username")
            .and_then(|v| v.as_str())
            .unwrap_or("instagram")
            .to_string(),
        like_count: item.get("like_count").and_then(|v| v.as_u64()),
        comment_count: item.get("comment_count").and_then(|v| v.as_u64()),
    })
}

/// Pull a cookie value out of Set-Cookie response headers.
fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    for value in headers.get_all(SET_COOKIE) {
        let raw = value.to_str().ok()?;
        let pair = raw.split(';').next()?.trim();
        if let Some(rest) = pair.strip_prefix(name) {
            if let Some(value) = rest.strip_prefix('=') {
                if !value.is_empty() && value != "\"\"" {
                    return Some(value.to_string());
                }
            }
        }
    }
    None
}

/// Stable per-account device id; Instagram expects the same device across
/// session reuse.
fn derive_device_id(username: &str) -> String {
    let mut hasher = DefaultHasher::new();
    username.hash(&mut hasher);
    format!("android-{:016x}", hasher.finish())
}

fn json_value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    fn test_blob() -> SessionBlob {
        SessionBlob {
            username: "bot_account".to_string(),
            user_id: Some("12345".to_string()),
            csrf_token: "csrf".to_string(),
            session_id: "sess".to_string(),
            device_id: derive_device_id("bot_account"),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_extract_shortcode_variants() {
        let cases = [
            ("https://www.instagram.com/p/DEF456/", Some("DEF456")),
            ("https://www.instagram.com/reel/ABC123xyz/", Some("ABC123xyz")),
            ("https://www.instagram.com/reels/GHI789/", Some("GHI789")),
            ("https://www.instagram.com/tv/JKL012/", Some("JKL012")),
            ("https://www.instagram.com/someuser/reel/B58TfHTnY2u/", Some("B58TfHTnY2u")),
            ("https://www.instagram.com/reel/ABC123/?igsh=xxx", Some("ABC123")),
            ("https://www.instagram.com/username/", None),
        ];
        for (input, expected) in cases {
            let url = Url::parse(input).expect("url");
            assert_eq!(extract_shortcode(&url).as_deref(), expected, "for {}", input);
        }
    }

    #[test]
    fn test_media_pk_from_shortcode() {
        assert_eq!(media_pk_from_shortcode("B"), Some(1));
        assert_eq!(media_pk_from_shortcode("Q"), Some(16));
        assert_eq!(media_pk_from_shortcode("BB"), Some(65));
        // '!' is not in the alphabet
        assert_eq!(media_pk_from_shortcode("AB!"), None);
        // Long shared codes only use the leading 11 chars
        assert_eq!(
            media_pk_from_shortcode("CwxyzABCDEFextradata"),
            media_pk_from_shortcode("CwxyzABCDEF")
        );
    }

    #[test]
    fn test_parse_story_ref() {
        let url = Url::parse("https://www.instagram.com/stories/cristiano/31415926535_000/").expect("url");
        assert_eq!(
            parse_story_ref(&url),
            Some(StoryRef {
                username: "cristiano".to_string(),
                story_pk: "31415926535".to_string(),
            })
        );

        let profile = Url::parse("https://www.instagram.com/cristiano/").expect("url");
        assert_eq!(parse_story_ref(&profile), None);

        let no_pk = Url::parse("https://www.instagram.com/stories/cristiano/abc/").expect("url");
        assert_eq!(parse_story_ref(&no_pk), None);
    }

    #[test]
    fn test_parse_media_info_single_video() {
        let body = json!({ "items": [{
            "media_type": 2,
            "video_versions": [{ "url": "https://cdn/video.mp4" }],
            "caption": { "text": "hello" },
            "user": { "username": "someone" },
            "like_count": 10,
            "comment_count": 2,
        }]});
        let info = parse_media_info(&body).expect("parse");
        assert_eq!(info.items.len(), 1);
        assert!(info.items[0].is_video);
        assert_eq!(info.kind(), "reel");
        let caption = info.caption_with_engagement();
        assert!(caption.contains("hello"));
        assert!(caption.contains("❤️ 10"));
    }

    #[test]
    fn test_parse_media_info_carousel_collects_all_items() {
        let body = json!({ "items": [{
            "media_type": 8,
            "carousel_media": [
                { "media_type": 1, "image_versions2": { "candidates": [{ "url": "https://cdn/1.jpg" }] } },
                { "media_type": 2, "video_versions": [{ "url": "https://cdn/2.mp4" }] },
                { "media_type": 1, "image_versions2": { "candidates": [{ "url": "https://cdn/3.jpg" }] } },
            ],
            "user": { "username": "someone" },
        }]});
        let info = parse_media_info(&body).expect("parse");
        assert_eq!(info.kind(), "carousel");
        assert_eq!(info.items.len(), 3);
        assert!(!info.items[0].is_video);
        assert!(info.items[1].is_video);
        assert_eq!(info.items[2].media_url, "https://cdn/3.jpg");
    }

    #[test]
    fn test_parse_media_info_empty_is_not_found() {
        let err = parse_media_info(&json!({})).expect_err("empty body");
        assert!(matches!(err, AppError::ContentNotFound(_)));
    }

    #[test]
    fn test_extract_cookie() {
        let mut headers = HeaderMap::new();
        headers.append(SET_COOKIE, "csrftoken=abc123; Path=/; Secure".parse().expect("header"));
        headers.append(SET_COOKIE, "sessionid=sid456; HttpOnly".parse().expect("header"));
        assert_eq!(extract_cookie(&headers, "csrftoken").as_deref(), Some("abc123"));
        assert_eq!(extract_cookie(&headers, "sessionid").as_deref(), Some("sid456"));
        assert_eq!(extract_cookie(&headers, "mid"), None);
    }

    #[test]
    fn test_extract_cookie_skips_cleared_values() {
        let mut headers = HeaderMap::new();
        headers.append(SET_COOKIE, "sessionid=\"\"; Max-Age=0".parse().expect("header"));
        assert_eq!(extract_cookie(&headers, "sessionid"), None);
    }

    #[test]
    fn test_session_blob_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let session_file = dir.path().join("session.json");
        let downloader = InstagramDownloader::with_credentials(
            Some("bot_account".to_string()),
            Some(SecretString::from("secret".to_string())),
            session_file.clone(),
        );

        let blob = test_blob();
        downloader.save_session_blob(&blob).expect("save");
        assert!(session_file.exists());

        let loaded = downloader.load_session_blob().expect("load");
        assert_eq!(loaded.username, blob.username);
        assert_eq!(loaded.session_id, blob.session_id);
        assert_eq!(loaded.device_id, blob.device_id);
    }

    #[test]
    fn test_load_session_blob_rejects_garbage() {
        let dir = tempfile::tempdir().expect("tempdir");
        let session_file = dir.path().join("session.json");
        std::fs::write(&session_file, "not json").expect("write");
        let downloader =
            InstagramDownloader::with_credentials(None, None, session_file);
        assert!(downloader.load_session_blob().is_none());
    }

    #[tokio::test]
    async fn test_missing_credentials_is_terminal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let downloader =
            InstagramDownloader::with_credentials(None, None, dir.path().join("session.json"));
        let err = downloader.ensure_authenticated().await.expect_err("no creds");
        assert!(matches!(err, AppError::NotConfigured(_)));
        assert!(err.is_terminal());
    }

    #[tokio::test]
    async fn test_established_session_is_reused_concurrently() {
        let dir = tempfile::tempdir().expect("tempdir");
        let downloader = Arc::new(InstagramDownloader::with_credentials(
            Some("bot_account".to_string()),
            Some(SecretString::from("secret".to_string())),
            dir.path().join("session.json"),
        ));
        downloader.force_authenticated(test_blob()).await;

        let mut handles = Vec::new();
        for _ in 0..16 {
            let d = Arc::clone(&downloader);
            handles.push(tokio::spawn(async move { d.ensure_authenticated().await }));
        }
        for handle in handles {
            handle.await.expect("join").expect("authenticated");
        }
        // No caller started a duplicate login flow
        assert_eq!(downloader.login_flow_count(), 0);
    }

    #[test]
    fn test_derive_device_id_is_stable() {
        assert_eq!(derive_device_id("bot_account"), derive_device_id("bot_account"));
        assert_ne!(derive_device_id("bot_account"), derive_device_id("other"));
        assert!(derive_device_id("bot_account").starts_with("android-"));
    }

    /// Live login race: N concurrent callers with no stored session must
    /// produce exactly one login flow.
    /// Run with: cargo test test_live_login_race -- --ignored --nocapture
    #[tokio::test]
    #[ignore] // requires network access and real credentials
    async fn test_live_login_race() {
        let _ = pretty_env_logger::try_init();
        let downloader = Arc::new(InstagramDownloader::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let d = Arc::clone(&downloader);
            handles.push(tokio::spawn(async move { d.ensure_authenticated().await }));
        }
        for handle in handles {
            let _ = handle.await.expect("join");
        }
        assert!(downloader.login_flow_count() <= 1);
    }
}
