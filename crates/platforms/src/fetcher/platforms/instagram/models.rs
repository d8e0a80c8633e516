use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::Value;

/// Key of the media info object inside the embedded page data.
pub const MEDIA_INFO_KEY: &str = "xdt_api__v1__media__shortcode__web_info";

/// Declared `media_type` of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Image = 1,
    Video = 2,
    Carousel = 8,
}

impl MediaType {
    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            1 => Some(MediaType::Image),
            2 => Some(MediaType::Video),
            8 => Some(MediaType::Carousel),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaInfo {
    pub items: Vec<MediaItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Caption {
    pub text: String,
}

/// One rendition of an image or video.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Candidate {
    pub url: String,
    pub width: i64,
    pub height: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageVersions {
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageMedia {
    pub original_width: i64,
    pub original_height: i64,
    #[serde(default)]
    pub caption: Option<Caption>,
    pub image_versions2: ImageVersions,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VideoMedia {
    pub original_width: i64,
    pub original_height: i64,
    #[serde(default)]
    pub caption: Option<Caption>,
    pub video_versions: Vec<Candidate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CarouselMedia {
    #[serde(default)]
    pub caption: Option<Caption>,
    pub carousel_media: Vec<CarouselItem>,
}

#[derive(Debug, Clone)]
pub enum MediaItem {
    Image(ImageMedia),
    Video(VideoMedia),
    Carousel(CarouselMedia),
}

/// Carousel children are images or videos only.
#[derive(Debug, Clone)]
pub enum CarouselItem {
    Image(ImageMedia),
    Video(VideoMedia),
}

impl MediaItem {
    pub fn caption(&self) -> Option<&str> {
        let caption = match self {
            MediaItem::Image(m) => m.caption.as_ref(),
            MediaItem::Video(m) => m.caption.as_ref(),
            MediaItem::Carousel(m) => m.caption.as_ref(),
        };
        caption.map(|c| c.text.as_str())
    }
}

fn media_type<E: de::Error>(value: &Value) -> Result<MediaType, E> {
    let code = value
        .get("media_type")
        .ok_or_else(|| E::missing_field("media_type"))?;
    code.as_u64()
        .and_then(MediaType::from_code)
        .ok_or_else(|| E::custom(format!("unknown media_type {code}")))
}

fn variant<T, E>(value: Value) -> Result<T, E>
where
    T: for<'de> Deserialize<'de>,
    E: de::Error,
{
    serde_json::from_value(value).map_err(E::custom)
}

impl<'de> Deserialize<'de> for MediaItem {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        match media_type(&value)? {
            MediaType::Image => variant(value).map(MediaItem::Image),
            MediaType::Video => variant(value).map(MediaItem::Video),
            MediaType::Carousel => variant(value).map(MediaItem::Carousel),
        }
    }
}

impl<'de> Deserialize<'de> for CarouselItem {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        match media_type(&value)? {
            MediaType::Image => variant(value).map(CarouselItem::Image),
            MediaType::Video => variant(value).map(CarouselItem::Video),
            MediaType::Carousel => Err(de::Error::custom("nested carousel item")),
        }
    }
}

/// Candidate matching the original dimensions, else the first one.
pub fn best_candidate(
    original_width: i64,
    original_height: i64,
    candidates: &[Candidate],
) -> Option<&Candidate> {
    candidates
        .iter()
        .find(|c| c.width == original_width && c.height == original_height)
        .or_else(|| candidates.first())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn candidate(url: &str, width: i64, height: i64) -> Candidate {
        Candidate {
            url: url.to_string(),
            width,
            height,
        }
    }

    #[test]
    fn test_best_candidate() {
        let candidates = [
            candidate("small", 320, 320),
            candidate("original", 1080, 1350),
            candidate("medium", 640, 800),
        ];
        assert_eq!(best_candidate(1080, 1350, &candidates).unwrap().url, "original");
        assert_eq!(best_candidate(1440, 1800, &candidates).unwrap().url, "small");
        assert!(best_candidate(1, 1, &[]).is_none());
    }

    #[test]
    fn test_discriminant_selects_variant() {
        let info: MediaInfo = serde_json::from_value(json!({
            "items": [{
                "media_type": 8,
                "caption": null,
                "carousel_media": [
                    {"media_type": 2, "original_width": 1, "original_height": 1,
                     "video_versions": [{"url": "v", "width": 1, "height": 1}]},
                    {"media_type": 1, "original_width": 1, "original_height": 1,
                     "image_versions2": {"candidates": [{"url": "i", "width": 1, "height": 1}]}}
                ]
            }]
        }))
        .unwrap();

        let MediaItem::Carousel(carousel) = &info.items[0] else {
            panic!("expected a carousel");
        };
        assert!(matches!(carousel.carousel_media[0], CarouselItem::Video(_)));
        assert!(matches!(carousel.carousel_media[1], CarouselItem::Image(_)));
        assert_eq!(info.items[0].caption(), None);
    }

    #[test]
    fn test_unknown_discriminant_is_rejected() {
        let err = serde_json::from_value::<MediaInfo>(json!({
            "items": [{"media_type": 5, "original_width": 1, "original_height": 1}]
        }))
        .unwrap_err();
        assert!(err.to_string().contains("unknown media_type 5"));

        let nested = serde_json::from_value::<MediaInfo>(json!({
            "items": [{"media_type": 8, "carousel_media": [{"media_type": 8, "carousel_media": []}]}]
        }));
        assert!(nested.is_err());

        let missing = serde_json::from_value::<MediaInfo>(json!({"items": [{"caption": null}]}));
        assert!(missing.is_err());
    }

    #[test]
    fn test_variant_fields_are_validated() {
        // an image discriminant with video fields must not be coerced
        let result = serde_json::from_value::<MediaInfo>(json!({
            "items": [{"media_type": 1, "original_width": 1, "original_height": 1,
                       "video_versions": [{"url": "v", "width": 1, "height": 1}]}]
        }));
        assert!(result.is_err());
    }
}
