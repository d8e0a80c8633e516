use serde::Deserialize;

/// Payload of the `__UNIVERSAL_DATA_FOR_REHYDRATION__` script.
#[derive(Debug, Deserialize)]
pub struct RehydrationData {
    #[serde(rename = "__DEFAULT_SCOPE__")]
    pub default_scope: DefaultScope,
}

/// Only the two scopes we read; every other scope is ignored.
#[derive(Debug, Deserialize)]
pub struct DefaultScope {
    #[serde(rename = "seo.abtest")]
    pub seo_abtest: Option<SeoAbtest>,

    #[serde(rename = "webapp.video-detail")]
    pub video_detail: Option<VideoDetail>,
}

#[derive(Debug, Deserialize)]
pub struct SeoAbtest {
    /// Canonical url of the item, e.g. `https://www.tiktok.com/@user/photo/7350`
    pub canonical: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDetail {
    pub status_code: i64,
    pub status_msg: Option<String>,
    pub item_info: Option<VideoItemInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoItemInfo {
    pub item_struct: VideoItem,
}

#[derive(Debug, Deserialize)]
pub struct VideoItem {
    pub desc: String,
    pub video: Video,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub height: i64,
    pub width: i64,
    /// Without watermark
    pub play_addr: Option<String>,
    /// With watermark
    pub download_addr: Option<String>,
}

impl Video {
    /// The play address, or the download address when that is missing or empty.
    pub fn best_url(&self) -> Option<&str> {
        [self.play_addr.as_deref(), self.download_addr.as_deref()]
            .into_iter()
            .flatten()
            .find(|url| !url.is_empty())
    }
}

/// Response of `/api/item/detail`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDetail {
    pub item_info: Option<PhotoItemInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoItemInfo {
    pub item_struct: PhotoItem,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoItem {
    pub desc: String,
    pub image_post: ImagePost,
    pub music: Music,
}

#[derive(Debug, Deserialize)]
pub struct ImagePost {
    pub title: String,
    pub images: Vec<Image>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub image_height: i64,
    pub image_width: i64,
    #[serde(rename = "imageURL")]
    pub image_url: UrlList,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlList {
    pub url_list: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Music {
    pub author_name: String,
    pub play_url: String,
    pub title: String,
}
