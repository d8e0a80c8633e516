use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use rand::{Rng, rng};
use regex::Regex;
use reqwest::Client;
use tracing::debug;
use url::Url;

use super::models::{ItemDetail, RehydrationData, VideoDetail};
use super::signer::{SignatureProvider, SigningSession};
use crate::config::PlatformsConfig;
use crate::fetcher::error::FetchError;
use crate::fetcher::platform_fetcher::{Fetcher, PlatformFetcher};
use crate::fetcher::retry::retry;
use crate::media::{AudioFile, MediaFile, Post};

pub(crate) static REHYDRATION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<script[^>]*\bid="__UNIVERSAL_DATA_FOR_REHYDRATION__"[^>]*>(.*?)</script>"#)
        .unwrap()
});

/// Fixed client fingerprint sent to the item detail api.
const ITEM_DETAIL_PARAMS: &[(&str, &str)] = &[
    ("aid", "1998"),
    ("app_language", "en"),
    ("app_name", "tiktok_web"),
    ("browser_language", "en-US"),
    ("browser_name", "Mozilla"),
    ("browser_platform", "Win32"),
    ("browser_version", "4.0"),
    ("device_id", "1234567890123456789"),
    ("device_platform", "web_pc"),
    ("os", "windows"),
    ("region", "US"),
    ("screen_height", "720"),
    ("screen_width", "1280"),
    ("webcast_language", "en"),
];

pub struct TikTok {
    pub fetcher: Fetcher,
    user_agent: String,
    base_url: String,
    signer: Arc<dyn SignatureProvider>,
}

impl TikTok {
    const BASE_URL: &str = "https://www.tiktok.com";

    pub fn new(
        page_url: String,
        client: Client,
        config: &PlatformsConfig,
        signer: Arc<dyn SignatureProvider>,
    ) -> Self {
        let mut fetcher = Fetcher::new("TikTok", page_url, client)
            .with_retry_policy(config.retry)
            .with_batch_size(config.batch_size);

        let user_agent = random_user_agent();
        fetcher.add_header(reqwest::header::USER_AGENT.as_str(), &user_agent);
        fetcher.add_header(reqwest::header::REFERER.as_str(), "https://www.tiktok.com/");
        fetcher.add_cookie(
            "tt_webid_v2",
            rng().random_range(10u64.pow(18)..=10u64.pow(19)).to_string(),
        );

        let base_url = config
            .tiktok_base_url
            .clone()
            .unwrap_or_else(|| Self::BASE_URL.to_string());

        Self {
            fetcher,
            user_agent,
            base_url,
            signer,
        }
    }

    pub fn supports_link(url: &Url) -> bool {
        url.host_str()
            .is_some_and(|host| host.ends_with("tiktok.com"))
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    async fn fetch_rehydration_data(&self) -> Result<RehydrationData, FetchError> {
        let json = retry(
            &self.fetcher.retry_policy,
            |e| e.is_retryable() || matches!(e, FetchError::ParseFailed(_)),
            || async {
                let response = self.fetcher.send(self.fetcher.get(&self.fetcher.url)).await?;
                let body = response.text().await?;
                extract_rehydration_json(&body).map(str::to_string)
            },
        )
        .await?;

        serde_json::from_str(&json).map_err(|e| FetchError::invalid_schema("rehydration data", e))
    }

    fn video_post(&self, detail: VideoDetail) -> Result<Post, FetchError> {
        let Some(info) = detail.item_info else {
            return Err(FetchError::SignInRequired(format!(
                "video detail has no item info (status {}: {})",
                detail.status_code,
                detail.status_msg.unwrap_or_default()
            )));
        };

        let item = info.item_struct;
        let download_url = item.video.best_url().ok_or_else(|| {
            FetchError::SignInRequired("video has no download address".to_string())
        })?;

        Ok(Post::single(
            self.fetcher.url.as_str(),
            item.desc.trim(),
            MediaFile::video(download_url),
        ))
    }

    fn item_detail_url(&self, item_id: &str) -> String {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("itemId", item_id)
            .extend_pairs(ITEM_DETAIL_PARAMS)
            .finish();
        format!("{}/api/item/detail?{}", self.base_url, query)
    }

    async fn photo_post(&self, item_id: &str) -> Result<Post, FetchError> {
        let unsigned_url = self.item_detail_url(item_id);
        let session = SigningSession {
            user_agent: self.user_agent.clone(),
            cookie_header: self.fetcher.cookie_header().unwrap_or_default(),
        };
        let signed_url = self.signer.sign(&unsigned_url, &session).await?;
        debug!("Item detail url: {}", signed_url);

        let body = retry(&self.fetcher.retry_policy, FetchError::is_retryable, || async {
            let response = self.fetcher.send(self.fetcher.get(&signed_url)).await?;
            Ok(response.text().await?)
        })
        .await?;

        let detail: ItemDetail =
            serde_json::from_str(&body).map_err(|e| FetchError::invalid_schema("item detail", e))?;
        let Some(info) = detail.item_info else {
            return Err(FetchError::SignInRequired(format!(
                "item {item_id} returned no item info"
            )));
        };

        let item = info.item_struct;
        let files = item
            .image_post
            .images
            .iter()
            .enumerate()
            .map(|(i, image)| {
                image
                    .image_url
                    .url_list
                    .first()
                    .map(MediaFile::photo)
                    .ok_or_else(|| FetchError::ParseFailed(format!("image {i} has no url")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let title = Some(item.image_post.title.trim().to_string()).filter(|t| !t.is_empty());
        let music = item.music;
        let audio = Some(music.play_url)
            .filter(|url| !url.is_empty())
            .map(|url| AudioFile::new(url, music.title, music.author_name));

        Ok(Post::multi(
            self.fetcher.url.as_str(),
            item.desc.trim(),
            files,
            title,
            audio,
        ))
    }
}

/// Json text of the rehydration script.
pub(crate) fn extract_rehydration_json(html: &str) -> Result<&str, FetchError> {
    REHYDRATION_REGEX
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| FetchError::ParseFailed("rehydration data not found".to_string()))
}

/// Item id of a canonical url ending in `/photo/<id>`.
pub(crate) fn photo_item_id(canonical: &str) -> Option<String> {
    let url = Url::parse(canonical).ok()?;
    let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
    match segments.as_slice() {
        [.., "photo", id] => Some((*id).to_string()),
        _ => None,
    }
}

fn random_lowercase(rng: &mut impl Rng, min: usize, max: usize) -> String {
    let len = rng.random_range(min..=max);
    (0..len)
        .map(|_| char::from(rng.random_range(b'a'..=b'z')))
        .collect()
}

/// Something like `qkzmf-oxw/127 (1718000000.0)`.
pub(crate) fn random_user_agent() -> String {
    let mut rng = rng();
    let first = random_lowercase(&mut rng, 4, 10);
    let second = random_lowercase(&mut rng, 3, 7);
    let version = rng.random_range(10..=300);
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    format!("{first}-{second}/{version} ({timestamp}.0)")
}

#[async_trait]
impl PlatformFetcher for TikTok {
    fn get_fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    async fn fetch_post(&self) -> Result<Post, FetchError> {
        let data = self.fetch_rehydration_data().await?;
        let scope = data.default_scope;

        if let Some(detail) = scope.video_detail {
            return self.video_post(detail);
        }

        let item_id = scope
            .seo_abtest
            .and_then(|abtest| photo_item_id(&abtest.canonical))
            .ok_or_else(|| FetchError::LinkUnsupported(self.fetcher.url.clone()))?;

        debug!("Photo post {}", item_id);
        self.photo_post(&item_id).await
    }
}
