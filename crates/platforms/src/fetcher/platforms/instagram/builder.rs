use std::ops::RangeInclusive;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use rand::{Rng, rng};
use regex::Regex;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use super::auth_mode::{AuthMode, get_auth_mode};
use super::challenge::{bypass_challenge, is_challenge_url, load_with_bypass, platform_cookies};
use super::login::{InstagramLogin, cookies_have_login_data};
use super::models::{
    CarouselItem, ImageMedia, MEDIA_INFO_KEY, MediaInfo, MediaItem, VideoMedia, best_candidate,
};
use crate::config::PlatformsConfig;
use crate::fetcher::error::FetchError;
use crate::fetcher::platform_fetcher::{Fetcher, PlatformFetcher};
use crate::fetcher::retry::retry;
use crate::media::{MediaFile, Post};
use crate::session::browser::{BrowserManager, BrowserPage, cookie_header};
use crate::session::store::KeyValueStore;

static SCRIPT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<script\b([^>]*)>(.*?)</script>").unwrap());

/// Browser-like headers. Without the full set the page sometimes lacks the
/// embedded media data.
const PAGE_HEADERS: &[(&str, &str)] = &[
    ("accept", "text/html,application/json,application/xhtml+xml"),
    ("accept-language", "en-US,en;q=0.6"),
    ("cache-control", "no-cache"),
    ("pragma", "no-cache"),
    ("priority", "u=0, i"),
    (
        "sec-ch-ua",
        r#""Chromium";v="136", "Brave";v="136", "Not.A/Brand";v="99""#,
    ),
    (
        "sec-ch-ua-full-version-list",
        r#""Chromium";v="136.0.0.0", "Brave";v="136.0.0.0", "Not.A/Brand";v="99.0.0.0""#,
    ),
    ("sec-ch-ua-mobile", "?0"),
    ("sec-ch-ua-model", r#""""#),
    ("sec-ch-ua-platform", r#""Linux""#),
    ("sec-ch-ua-platform-version", r#""6.6.88""#),
    ("sec-fetch-dest", "document"),
    ("sec-fetch-mode", "navigate"),
    ("sec-fetch-site", "none"),
    ("sec-fetch-user", "?1"),
    ("sec-gpc", "1"),
    ("upgrade-insecure-requests", "1"),
];

const NO_LOGIN_MESSAGE: &str = "No Instagram login data found. Ask the admin to log in via \
     settings or to switch to anonymous authentication mode.";

pub struct Instagram {
    pub fetcher: Fetcher,
    base_url: String,
    store: Arc<dyn KeyValueStore>,
    browser: Arc<BrowserManager>,
    login: InstagramLogin,
    challenge_attempts: u32,
    page_close_delay_ms: RangeInclusive<u64>,
}

impl Instagram {
    pub const BASE_URL: &str = "https://www.instagram.com";

    pub fn new(
        page_url: String,
        client: Client,
        config: &PlatformsConfig,
        store: Arc<dyn KeyValueStore>,
        browser: Arc<BrowserManager>,
    ) -> Self {
        let mut fetcher = Fetcher::new("Instagram", page_url, client)
            .with_retry_policy(config.retry)
            .with_batch_size(config.batch_size);
        for (name, value) in PAGE_HEADERS {
            fetcher.add_header(name, value);
        }

        let base_url = config
            .instagram_base_url
            .clone()
            .unwrap_or_else(|| Self::BASE_URL.to_string());
        let login = InstagramLogin::new(Arc::clone(&browser), Arc::clone(&store), config);

        Self {
            fetcher,
            base_url,
            store,
            browser,
            login,
            challenge_attempts: config.challenge_attempts,
            page_close_delay_ms: 1000..=3000,
        }
    }

    /// Range the authenticated page stays open for after use.
    pub fn with_page_close_delay_ms(mut self, delay: RangeInclusive<u64>) -> Self {
        self.page_close_delay_ms = delay;
        self
    }

    /// Instagram post or reel pages.
    pub fn supports_link(url: &Url) -> bool {
        let on_instagram = url
            .host_str()
            .is_some_and(|host| host.ends_with("instagram.com"));
        on_instagram
            && url
                .path_segments()
                .is_some_and(|mut segments| segments.any(|s| s == "reel" || s == "p"))
    }

    async fn fetch_media_info(&self) -> Result<MediaInfo, FetchError> {
        let mode = get_auth_mode(self.store.as_ref()).await?;
        debug!("Instagram auth mode: {}", mode);

        let media_info = match mode {
            AuthMode::Anonymous => {
                // the embedded data is sometimes missing on the first loads
                retry(
                    &self.fetcher.retry_policy,
                    |e| e.is_retryable() || matches!(e, FetchError::ParseFailed(_)),
                    || self.fetch_media_info_anonymously(),
                )
                .await?
            }
            AuthMode::Authenticated => self.fetch_media_info_authenticated().await?,
        };

        serde_json::from_value(media_info).map_err(|e| FetchError::invalid_schema("media info", e))
    }

    async fn fetch_media_info_anonymously(&self) -> Result<Value, FetchError> {
        let response = self.fetcher.send(self.fetcher.get(&self.fetcher.url)).await?;
        if is_challenge_url(response.url().as_str()) {
            return Err(FetchError::ChallengeUnresolved {
                attempts: 0,
                reason: "anonymous request redirected to the challenge page".to_string(),
            });
        }

        let html = response.text().await?;
        extract_media_info(&html)
    }

    async fn fetch_media_info_authenticated(&self) -> Result<Value, FetchError> {
        let session = self.browser.acquire().await?;
        self.login.restore_login_cookies(session.as_ref()).await?;

        let cookies = session.cookies().await?;
        if !cookies_have_login_data(&cookies) {
            return Err(FetchError::SignInRequired(NO_LOGIN_MESSAGE.to_string()));
        }
        self.fetcher.clear_cookies();
        self.fetcher
            .set_cookies_from_string(&cookie_header(&platform_cookies(&self.base_url, cookies)));

        let page = session.new_page().await?;
        debug!("Opening page url: {}", self.fetcher.url);

        let page_ref = page.as_ref();
        let session_ref = session.as_ref();
        let landing = load_with_bypass(
            self.challenge_attempts,
            || page_ref.goto(&self.fetcher.url),
            |attempt| {
                debug!("Challenge bypass attempt {}", attempt);
                bypass_challenge(&self.fetcher, &self.base_url, session_ref)
            },
        )
        .await;

        self.close_page_later(page);
        extract_media_info(&landing?.body)
    }

    /// Closes the page after a short random delay, without waiting for it.
    fn close_page_later(&self, page: Arc<dyn BrowserPage>) {
        let delay = rng().random_range(self.page_close_delay_ms.clone());
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay)).await;
            if !page.is_closed() {
                if let Err(e) = page.close().await {
                    debug!("Failed to close page: {}", e);
                }
            }
        });
    }
}

/// Finds the media info object in the page's embedded json scripts.
pub(crate) fn extract_media_info(html: &str) -> Result<Value, FetchError> {
    for captures in SCRIPT_REGEX.captures_iter(html) {
        let attributes = captures.get(1).map_or("", |m| m.as_str());
        let text = captures.get(2).map_or("", |m| m.as_str());

        if !attributes.contains(r#"type="application/json""#)
            || !attributes.contains("data-sjs")
            || !text.contains(MEDIA_INFO_KEY)
        {
            continue;
        }

        let json: Value = serde_json::from_str(text)
            .map_err(|e| FetchError::invalid_schema("embedded page data", e))?;
        if let Some(media_info) = find_key(&json, MEDIA_INFO_KEY) {
            return Ok(media_info.clone());
        }
    }

    Err(FetchError::ParseFailed("no media info data found".to_string()))
}

/// Depth-first search for the first value stored under `key`.
fn find_key<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map
            .get(key)
            .or_else(|| map.values().find_map(|v| find_key(v, key))),
        Value::Array(items) => items.iter().find_map(|v| find_key(v, key)),
        _ => None,
    }
}

fn image_file(media: &ImageMedia) -> Result<MediaFile, FetchError> {
    best_candidate(
        media.original_width,
        media.original_height,
        &media.image_versions2.candidates,
    )
    .map(|c| MediaFile::photo(c.url.as_str()))
    .ok_or_else(|| FetchError::ParseFailed("image has no candidates".to_string()))
}

fn video_file(media: &VideoMedia) -> Result<MediaFile, FetchError> {
    best_candidate(
        media.original_width,
        media.original_height,
        &media.video_versions,
    )
    .map(|c| MediaFile::video(c.url.as_str()))
    .ok_or_else(|| FetchError::ParseFailed("video has no versions".to_string()))
}

/// Maps the first media item to a post.
pub(crate) fn media_info_to_post(info: &MediaInfo, page_url: &str) -> Result<Post, FetchError> {
    let item = info
        .items
        .first()
        .ok_or_else(|| FetchError::ParseFailed("media info has no items".to_string()))?;
    let description = item.caption().unwrap_or_default();

    match item {
        MediaItem::Image(media) => Ok(Post::single(page_url, description, image_file(media)?)),
        MediaItem::Video(media) => Ok(Post::single(page_url, description, video_file(media)?)),
        MediaItem::Carousel(carousel) => {
            let files = carousel
                .carousel_media
                .iter()
                .map(|child| match child {
                    CarouselItem::Image(media) => image_file(media),
                    CarouselItem::Video(media) => video_file(media),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Post::multi(page_url, description, files, None, None))
        }
    }
}

#[async_trait]
impl PlatformFetcher for Instagram {
    fn get_fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    async fn fetch_post(&self) -> Result<Post, FetchError> {
        let info = self.fetch_media_info().await?;
        let post = media_info_to_post(&info, &self.fetcher.url)?;
        info!("Resolved Instagram post with {} file(s)", post.files().len());
        Ok(post)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode, header};
    use axum::response::{Html, IntoResponse, Redirect, Response};
    use axum::routing::{get, post};
    use axum::{Form, Json, Router};
    use serde_json::json;
    use std::collections::HashMap;

    use futures::StreamExt;

    use super::*;
    use crate::fetcher::platforms::instagram::auth_mode::set_auth_mode;
    use crate::fetcher::retry::RetryPolicy;
    use crate::media::FileType;
    use crate::session::browser::BrowserCookie;
    use crate::session::browser::testing::FakeLauncher;
    use crate::session::store::MemoryStore;
    use crate::test_util::serve;

    fn image(url_suffix: &str) -> serde_json::Value {
        json!({
            "media_type": 1,
            "original_width": 1080,
            "original_height": 1350,
            "caption": null,
            "image_versions2": {"candidates": [
                {"url": format!("https://cdn/{url_suffix}-small.jpg"), "width": 320, "height": 400},
                {"url": format!("https://cdn/{url_suffix}.jpg"), "width": 1080, "height": 1350}
            ]}
        })
    }

    fn video(url_suffix: &str) -> serde_json::Value {
        json!({
            "media_type": 2,
            "original_width": 720,
            "original_height": 1280,
            "caption": {"text": "a reel"},
            "video_versions": [
                {"url": format!("https://cdn/{url_suffix}-a.mp4"), "width": 480, "height": 854},
                {"url": format!("https://cdn/{url_suffix}-b.mp4"), "width": 640, "height": 1138}
            ]
        })
    }

    /// Buries the media info the way the real pages do.
    fn page(item: serde_json::Value) -> String {
        let data = json!({"require": [["ScheduledServerJS", "handle", null, [{
            "__bbox": {"require": [["RelayPrefetchedStreamCache", "next", [], ["adp", {
                "__bbox": {"result": {"data": {MEDIA_INFO_KEY: {"items": [item]}}}}
            }]]]}
        }]]]});
        format!(
            r#"<html><head>
<script type="application/json" data-sjs>{{"require":[["Bootloader","handle",null,[]]]}}</script>
<script type="text/javascript">var x = "{MEDIA_INFO_KEY}";</script>
<script type="application/json" data-content-len="100" data-sjs>{data}</script>
</head></html>"#
        )
    }

    #[derive(Default)]
    struct Fixture {
        flaky_hits: AtomicUsize,
        anonymous_challenge_hits: AtomicUsize,
        challenge_passed: AtomicBool,
        take_challenge_hits: AtomicUsize,
        take_challenge_cookies: parking_lot::Mutex<Vec<String>>,
    }

    fn has_session(headers: &HeaderMap) -> bool {
        headers
            .get(header::COOKIE)
            .and_then(|c| c.to_str().ok())
            .is_some_and(|c| c.contains("sessionid=secret"))
    }

    async fn take_challenge(
        State(state): State<Arc<Fixture>>,
        headers: HeaderMap,
        Form(form): Form<HashMap<String, String>>,
    ) -> Response {
        state.take_challenge_hits.fetch_add(1, Ordering::SeqCst);
        if let Some(cookie) = headers.get(header::COOKIE).and_then(|c| c.to_str().ok()) {
            state.take_challenge_cookies.lock().push(cookie.to_string());
        }
        if form.get("challenge_context").map(String::as_str) != Some("ctx")
            || form.get("nest_data_manifest").map(String::as_str) != Some("true")
        {
            return StatusCode::BAD_REQUEST.into_response();
        }
        state.challenge_passed.store(true, Ordering::SeqCst);
        ([(header::SET_COOKIE, "challenge_ok=1; Path=/")], "{}").into_response()
    }

    async fn fixture() -> (String, Arc<Fixture>) {
        let state = Arc::new(Fixture::default());
        let router = Router::new()
            .route(
                "/p/carousel/",
                get(|| async {
                    Html(page(json!({
                        "media_type": 8,
                        "caption": {"text": "two of them"},
                        "carousel_media": [image("one"), video("two"), image("three")]
                    })))
                }),
            )
            .route(
                "/p/two-images/",
                get(|| async {
                    Html(page(json!({
                        "media_type": 8,
                        "carousel_media": [image("one"), image("two")]
                    })))
                }),
            )
            .route(
                "/p/empty-carousel/",
                get(|| async {
                    Html(page(json!({
                        "media_type": 8,
                        "caption": {"text": "nothing left"},
                        "carousel_media": []
                    })))
                }),
            )
            .route("/reel/video/", get(|| async { Html(page(video("reel"))) }))
            .route("/p/image/", get(|| async { Html(page(image("single"))) }))
            .route(
                "/p/flaky/",
                get(|State(state): State<Arc<Fixture>>| async move {
                    if state.flaky_hits.fetch_add(1, Ordering::SeqCst) == 0 {
                        Html("<html>login wall</html>".to_string())
                    } else {
                        Html(page(image("flaky")))
                    }
                }),
            )
            .route("/p/missing/", get(|| async { Html("<html></html>") }))
            .route(
                "/p/unknown/",
                get(|| async {
                    Html(page(json!({"media_type": 5, "original_width": 1, "original_height": 1})))
                }),
            )
            .route(
                "/p/challenged/",
                get(|State(state): State<Arc<Fixture>>| async move {
                    state.anonymous_challenge_hits.fetch_add(1, Ordering::SeqCst);
                    Redirect::to("/challenge/?next=/p/challenged/")
                }),
            )
            .route(
                "/p/members-only/",
                get(
                    |State(state): State<Arc<Fixture>>, headers: HeaderMap| async move {
                        if !has_session(&headers) {
                            return Redirect::to("/accounts/login/").into_response();
                        }
                        if !state.challenge_passed.load(Ordering::SeqCst) {
                            return Redirect::to("/challenge/?next=/p/members-only/")
                                .into_response();
                        }
                        Html(page(image("members"))).into_response()
                    },
                ),
            )
            .route("/challenge/", get(|| async { Html("<html>challenge</html>") }))
            .route(
                "/api/v1/challenge/web/",
                get(|headers: HeaderMap| async move {
                    if has_session(&headers) {
                        Json(json!({"challenge_context": "ctx"})).into_response()
                    } else {
                        StatusCode::FORBIDDEN.into_response()
                    }
                }),
            )
            .route(
                "/api/v1/bloks/apps/com.instagram.challenge.navigation.take_challenge/",
                post(take_challenge),
            )
            .with_state(Arc::clone(&state));
        (serve(router).await, state)
    }

    struct Env {
        base: String,
        config: PlatformsConfig,
        store: Arc<MemoryStore>,
        launcher: Arc<FakeLauncher>,
        browser: Arc<BrowserManager>,
    }

    impl Env {
        fn instagram(&self, path: &str) -> Instagram {
            Instagram::new(
                format!("{}{}", self.base, path),
                Client::new(),
                &self.config,
                self.store.clone(),
                self.browser.clone(),
            )
            .with_page_close_delay_ms(0..=0)
        }
    }

    fn env(base: &str, cookies: Vec<BrowserCookie>) -> Env {
        let launcher = Arc::new(FakeLauncher::with_cookies(cookies));
        Env {
            base: base.to_string(),
            config: PlatformsConfig {
                retry: RetryPolicy::new(3, 0),
                instagram_base_url: Some(base.to_string()),
                ..Default::default()
            },
            store: Arc::new(MemoryStore::new()),
            browser: Arc::new(BrowserManager::new(launcher.clone())),
            launcher,
        }
    }

    fn login_cookies() -> Vec<BrowserCookie> {
        vec![
            BrowserCookie::new("ds_user_id", "42", ".instagram.com"),
            BrowserCookie::new("sessionid", "secret", ".instagram.com"),
        ]
    }

    #[test]
    fn test_supports_link() {
        let yes = [
            "https://www.instagram.com/p/C1a2b3/",
            "https://instagram.com/reel/C1a2b3/?igsh=x",
            "https://www.instagram.com/someone/p/C1a2b3/",
        ];
        let no = [
            "https://www.instagram.com/someone/",
            "https://www.instagram.com/stories/someone/1/",
            "https://www.tiktok.com/p/1",
        ];
        for url in yes {
            assert!(Instagram::supports_link(&Url::parse(url).unwrap()), "{url}");
        }
        for url in no {
            assert!(!Instagram::supports_link(&Url::parse(url).unwrap()), "{url}");
        }
    }

    #[test]
    fn test_find_key_searches_depth_first() {
        let json = json!({"a": [{"b": {"target": 1}}], "c": {"target": 2}});
        assert!(find_key(&json, "target").is_some());
        assert!(find_key(&json, "absent").is_none());
        assert_eq!(find_key(&json!({"target": 3}), "target"), Some(&json!(3)));
    }

    #[test]
    fn test_extract_media_info_skips_unrelated_scripts() {
        let info = extract_media_info(&page(image("x"))).unwrap();
        assert_eq!(info["items"][0]["media_type"], 1);

        let no_sjs = r#"<script type="application/json">{"xdt_api__v1__media__shortcode__web_info": {}}</script>"#;
        assert!(matches!(
            extract_media_info(no_sjs),
            Err(FetchError::ParseFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_anonymous_carousel_keeps_order_and_types() {
        let (base, _) = fixture().await;
        let post = env(&base, vec![])
            .instagram("/p/carousel/")
            .fetch_post()
            .await
            .unwrap();

        let Post::Multi(multi) = post else {
            panic!("expected a multi post");
        };
        assert_eq!(multi.description, "two of them");
        assert_eq!(
            multi.files,
            vec![
                MediaFile::photo("https://cdn/one.jpg"),
                MediaFile::video("https://cdn/two-a.mp4"),
                MediaFile::photo("https://cdn/three.jpg"),
            ]
        );
        assert!(multi.title.is_none());
        assert!(multi.audio.is_none());
    }

    #[tokio::test]
    async fn test_anonymous_two_images() {
        let (base, _) = fixture().await;
        let post = env(&base, vec![])
            .instagram("/p/two-images/")
            .fetch_post()
            .await
            .unwrap();

        assert!(matches!(post, Post::Multi(_)));
        assert_eq!(post.files().len(), 2);
        assert!(post.files().iter().all(|f| f.file_type() == FileType::Photo));
        assert_eq!(post.description(), "");
    }

    #[tokio::test]
    async fn test_empty_carousel_has_no_batches() {
        let (base, _) = fixture().await;
        let instagram = env(&base, vec![]).instagram("/p/empty-carousel/");
        let post = instagram.fetch_post().await.unwrap();

        let Post::Multi(multi) = &post else {
            panic!("expected a multi post");
        };
        assert!(multi.files.is_empty());
        assert_eq!(multi.description, "nothing left");

        let batches: Vec<_> = instagram
            .generate_stream_batches(post.files())
            .collect()
            .await;
        assert!(batches.is_empty());
    }

    #[tokio::test]
    async fn test_single_video_and_image() {
        let (base, _) = fixture().await;
        let env = env(&base, vec![]);

        let video = env.instagram("/reel/video/").fetch_post().await.unwrap();
        let Post::Single(single) = video else {
            panic!("expected a single post");
        };
        assert_eq!(single.file, MediaFile::video("https://cdn/reel-a.mp4"));
        assert_eq!(single.description, "a reel");

        let image = env.instagram("/p/image/").fetch_post().await.unwrap();
        assert_eq!(image.files(), [MediaFile::photo("https://cdn/single.jpg")]);
    }

    #[tokio::test]
    async fn test_anonymous_retries_missing_data() {
        let (base, state) = fixture().await;
        let post = env(&base, vec![])
            .instagram("/p/flaky/")
            .fetch_post()
            .await
            .unwrap();

        assert_eq!(post.files().len(), 1);
        assert_eq!(state.flaky_hits.load(Ordering::SeqCst), 2);

        let missing = env(&base, vec![]).instagram("/p/missing/").fetch_post().await;
        assert!(matches!(missing, Err(FetchError::ParseFailed(_))));
    }

    #[tokio::test]
    async fn test_unknown_media_type_is_a_schema_error() {
        let (base, _) = fixture().await;
        let result = env(&base, vec![]).instagram("/p/unknown/").fetch_post().await;
        assert!(matches!(
            result,
            Err(FetchError::InvalidSchema { what: "media info", .. })
        ));
    }

    #[tokio::test]
    async fn test_anonymous_challenge_is_not_retried() {
        let (base, state) = fixture().await;
        let result = env(&base, vec![]).instagram("/p/challenged/").fetch_post().await;

        assert!(matches!(
            result,
            Err(FetchError::ChallengeUnresolved { attempts: 0, .. })
        ));
        assert_eq!(state.anonymous_challenge_hits.load(Ordering::SeqCst), 1);
        assert_eq!(state.take_challenge_hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_authenticated_requires_login_cookies() {
        let (base, _) = fixture().await;
        let env = env(&base, vec![]);
        set_auth_mode(env.store.as_ref(), AuthMode::Authenticated)
            .await
            .unwrap();

        let result = env.instagram("/p/image/").fetch_post().await;
        assert!(matches!(result, Err(FetchError::SignInRequired(_))));
    }

    #[tokio::test]
    async fn test_authenticated_passes_challenge() {
        let (base, state) = fixture().await;
        let env = env(&base, login_cookies());
        set_auth_mode(env.store.as_ref(), AuthMode::Authenticated)
            .await
            .unwrap();

        let post = env
            .instagram("/p/members-only/")
            .fetch_post()
            .await
            .unwrap();
        assert_eq!(post.files(), [MediaFile::photo("https://cdn/members.jpg")]);
        assert_eq!(state.take_challenge_hits.load(Ordering::SeqCst), 1);

        let session = env.launcher.session(0);
        assert!(session.cookies.lock().iter().any(|c| c.name == "challenge_ok"));

        tokio::time::sleep(Duration::from_millis(50)).await;
        let pages = session.pages.lock();
        assert_eq!(pages.len(), 1);
        assert!(pages[0].is_closed());
    }

    #[tokio::test]
    async fn test_challenge_requests_carry_only_instagram_cookies() {
        let (base, state) = fixture().await;
        let mut cookies = login_cookies();
        cookies.push(BrowserCookie::new("NID", "tracker", ".google.com"));
        let env = env(&base, cookies);
        set_auth_mode(env.store.as_ref(), AuthMode::Authenticated)
            .await
            .unwrap();

        env.instagram("/p/members-only/")
            .fetch_post()
            .await
            .unwrap();

        let sent = state.take_challenge_cookies.lock();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("sessionid=secret"));
        assert!(!sent[0].contains("NID"));
    }

    #[tokio::test]
    async fn test_authenticated_challenge_attempts_are_bounded() {
        let (base, state) = fixture().await;
        let env = env(&base, login_cookies());
        set_auth_mode(env.store.as_ref(), AuthMode::Authenticated)
            .await
            .unwrap();

        let result = env.instagram("/p/challenged/").fetch_post().await;
        assert!(matches!(
            result,
            Err(FetchError::ChallengeUnresolved { attempts: 3, .. })
        ));
        assert_eq!(state.take_challenge_hits.load(Ordering::SeqCst), 3);
        assert_eq!(state.anonymous_challenge_hits.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_authenticated_restores_stored_login() {
        let (base, _) = fixture().await;
        let env = env(&base, vec![]);
        set_auth_mode(env.store.as_ref(), AuthMode::Authenticated)
            .await
            .unwrap();
        env.store
            .set(
                "platforms/instagram/login_cookies",
                &serde_json::to_string(&login_cookies()).unwrap(),
            )
            .await
            .unwrap();

        let post = env.instagram("/p/image/").fetch_post().await.unwrap();
        assert_eq!(post.files().len(), 1);
        assert_eq!(env.launcher.launches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    #[ignore]
    async fn test_live_post() {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .init();

        let instagram = Instagram::new(
            "https://www.instagram.com/p/C5Yb3Kqr0Gz/".to_string(),
            crate::fetcher::default_client().unwrap(),
            &PlatformsConfig::default(),
            Arc::new(MemoryStore::new()),
            Arc::new(BrowserManager::unavailable("live test")),
        );
        let post = instagram.fetch_post().await.unwrap();
        println!("{post:?}");
    }
}
