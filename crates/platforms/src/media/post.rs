use serde::{Deserialize, Serialize};

use super::file::{AudioFile, MediaFile};

/// A post made of exactly one file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SinglePost {
    pub page_url: String,
    pub description: String,
    pub file: MediaFile,
}

/// A post made of several files, kept in the order the platform lists them.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MultiPost {
    pub page_url: String,
    pub description: String,
    pub files: Vec<MediaFile>,
    pub title: Option<String>,
    pub audio: Option<AudioFile>,
}

/// Platform-agnostic result of fetching one post page.
///
/// # Examples
///
/// ```rust
/// use platforms_fetcher::media::{MediaFile, Post};
///
/// let post = Post::single(
///     "https://www.tiktok.com/@user/video/1",
///     "Just a black screen",
///     MediaFile::video("https://cdn.example.com/v.mp4"),
/// );
/// assert_eq!(post.files().len(), 1);
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Post {
    Single(SinglePost),
    Multi(MultiPost),
}

impl Post {
    pub fn single<U: Into<String>, D: Into<String>>(
        page_url: U,
        description: D,
        file: MediaFile,
    ) -> Self {
        Post::Single(SinglePost {
            page_url: page_url.into(),
            description: description.into(),
            file,
        })
    }

    pub fn multi<U: Into<String>, D: Into<String>>(
        page_url: U,
        description: D,
        files: Vec<MediaFile>,
        title: Option<String>,
        audio: Option<AudioFile>,
    ) -> Self {
        Post::Multi(MultiPost {
            page_url: page_url.into(),
            description: description.into(),
            files,
            title,
            audio,
        })
    }

    pub fn page_url(&self) -> &str {
        match self {
            Post::Single(post) => &post.page_url,
            Post::Multi(post) => &post.page_url,
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Post::Single(post) => &post.description,
            Post::Multi(post) => &post.description,
        }
    }

    /// All visual files of the post in source order.
    pub fn files(&self) -> &[MediaFile] {
        match self {
            Post::Single(post) => std::slice::from_ref(&post.file),
            Post::Multi(post) => &post.files,
        }
    }

    pub fn audio(&self) -> Option<&AudioFile> {
        match self {
            Post::Single(_) => None,
            Post::Multi(post) => post.audio.as_ref(),
        }
    }
}
