use crate::fetcher::default::DEFAULT_UA;
use crate::fetcher::pipeline::StreamPipeline;
use crate::fetcher::retry::{RetryPolicy, retry};
use crate::media::{ByteStream, MediaFile, Post, StreamBatch};

use super::error::FetchError;
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use parking_lot::RwLock;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, RequestBuilder, Response};
use rustc_hash::FxHashMap;
use std::io;
use std::str::FromStr;
use tracing::debug;

/// Base fetcher holding the outgoing request state of one platform client.
///
/// Each fetcher instance maintains its own headers and cookie store. Cookies are attached to every request and `Set-Cookie`
/// headers of every response are stored back, so a fetcher behaves like a
/// small browser tab. Nothing here is ever persisted.
///
/// # Example Usage
///
/// ```rust,no_run
/// use platforms_fetcher::fetcher::platform_fetcher::Fetcher;
///
/// # async fn run() -> Result<(), platforms_fetcher::fetcher::error::FetchError> {
/// let fetcher = Fetcher::new("Platform", "https://example.com", reqwest::Client::new());
/// fetcher.set_cookies_from_string("token=xyz789; user_id=12345");
///
/// let response = fetcher.send(fetcher.get("https://example.com/data")).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Fetcher {
    // url of the post page, e.g., "https://www.instagram.com/p/B8pUDhTFZVj"
    pub url: String,
    // name of the platform, e.g., "TikTok", "Instagram"...
    pub platform_name: String,
    pub client: Client,
    pub retry_policy: RetryPolicy,
    pub batch_size: usize,
    platform_headers: HeaderMap,
    cookies: RwLock<FxHashMap<String, String>>,
}

impl Fetcher {
    pub fn new<S1: Into<String>, S2: Into<String>>(
        platform_name: S1,
        page_url: S2,
        client: Client,
    ) -> Self {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            reqwest::header::USER_AGENT,
            HeaderValue::from_static(DEFAULT_UA),
        );
        default_headers.insert(
            reqwest::header::ACCEPT,
            HeaderValue::from_static("text/html,application/json,application/xhtml+xml"),
        );
        default_headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-US,en;q=0.6"),
        );

        Self {
            platform_name: platform_name.into(),
            url: page_url.into(),
            client,
            retry_policy: RetryPolicy::default(),
            batch_size: 10,
            platform_headers: default_headers,
            cookies: RwLock::new(FxHashMap::default()),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Sets a platform header. Invalid names or values are skipped.
    pub fn add_header<K: AsRef<str>, V: AsRef<str>>(&mut self, key: K, value: V) {
        match (
            HeaderName::from_str(key.as_ref()),
            HeaderValue::from_str(value.as_ref()),
        ) {
            (Ok(name), Ok(value)) => {
                self.platform_headers.insert(name, value);
            }
            _ => debug!("Skipping invalid header: {}", key.as_ref()),
        }
    }

    /// Add a single cookie to the fetcher's cookie store.
    pub fn add_cookie<N: Into<String>, V: Into<String>>(&self, name: N, value: V) {
        self.cookies.write().insert(name.into(), value.into());
    }

    /// Set cookies from a cookie string (format: "name1=value1; name2=value2").
    pub fn set_cookies_from_string(&self, cookie_string: &str) {
        let mut cookies = self.cookies.write();
        for cookie in cookie_string.split(';') {
            let cookie = cookie.trim();
            if let Some((name, value)) = cookie.split_once('=') {
                cookies.insert(name.trim().to_string(), value.trim().to_string());
            }
        }
    }

    pub fn clear_cookies(&self) {
        self.cookies.write().clear();
    }

    pub fn get_cookie(&self, name: &str) -> Option<String> {
        self.cookies.read().get(name).cloned()
    }

    pub fn has_cookie(&self, name: &str) -> bool {
        self.cookies.read().contains_key(name)
    }

    /// Stored cookies as a `Cookie` header value, `None` when empty.
    pub fn cookie_header(&self) -> Option<String> {
        let cookies = self.cookies.read();
        if cookies.is_empty() {
            return None;
        }

        let mut pairs: Vec<_> = cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect();
        pairs.sort();
        Some(pairs.join("; "))
    }

    /// Parse and store cookies from HTTP response headers.
    pub fn parse_and_store_cookies(&self, headers: &HeaderMap) {
        for (name, value) in parse_set_cookies(headers) {
            debug!("Auto-storing cookie: {}", name);
            self.cookies.write().insert(name, value);
        }
    }

    pub fn get(&self, url: &str) -> RequestBuilder {
        self.request(Method::GET, url)
    }

    pub fn post(&self, url: &str) -> RequestBuilder {
        self.request(Method::POST, url)
    }

    /// Create an HTTP request with platform headers and cookies.
    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let mut builder = self
            .client
            .request(method, url)
            .headers(self.platform_headers.clone());

        if let Some(cookie) = self
            .cookie_header()
            .and_then(|header| HeaderValue::from_str(&header).ok())
        {
            builder = builder.header(reqwest::header::COOKIE, cookie);
        }

        builder
    }

    /// Sends a request, records response cookies and rejects non-2xx statuses.
    pub async fn send(&self, request: RequestBuilder) -> Result<Response, FetchError> {
        let response = request.send().await?;
        self.parse_and_store_cookies(response.headers());

        let status = response.status();
        debug!("{} {} -> {}", self.platform_name, response.url(), status);
        if !status.is_success() {
            return Err(FetchError::BadStatus {
                url: response.url().to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    /// A single retried GET whose body is handed out as a stream.
    pub async fn get_byte_stream(&self, url: &str) -> Result<ByteStream, FetchError> {
        retry(&self.retry_policy, FetchError::is_retryable, || async {
            let response = self.send(self.get(url)).await?;
            if response.content_length() == Some(0) {
                return Err(FetchError::EmptyBody(url.to_string()));
            }
            let stream: ByteStream =
                Box::pin(response.bytes_stream().map(|chunk| chunk.map_err(io::Error::other)));
            Ok(stream)
        })
        .await
    }
}

/// Extracts `name=value` pairs from every `Set-Cookie` header.
pub(crate) fn parse_set_cookies(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|cookie_str| cookie_str.split(';').next())
        .filter_map(|cookie_part| cookie_part.split_once('='))
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .filter(|(name, _)| !name.is_empty())
        .collect()
}

#[async_trait]
pub trait PlatformFetcher: Send + Sync {
    fn get_fetcher(&self) -> &Fetcher;

    fn name(&self) -> &str {
        &self.get_fetcher().platform_name
    }

    /// Resolves the page into a normalized post.
    async fn fetch_post(&self) -> Result<Post, FetchError>;

    async fn get_byte_stream(&self, url: &str) -> Result<ByteStream, FetchError> {
        self.get_fetcher().get_byte_stream(url).await
    }

    /// Lazily downloads `files` in groups of the configured batch size.
    fn generate_stream_batches(&self, files: &[MediaFile]) -> BoxStream<'_, StreamBatch> {
        let fetcher = self.get_fetcher();
        StreamPipeline::new(fetcher, fetcher.batch_size).generate(files.to_vec())
    }
}
