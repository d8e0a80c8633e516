use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Photo,
    Video,
    Audio,
}

impl FileType {
    pub fn as_str(&self) -> &str {
        match self {
            FileType::Photo => "photo",
            FileType::Video => "video",
            FileType::Audio => "audio",
        }
    }

    /// File extension used when a stream of this type is written to disk.
    pub fn extension(&self) -> &str {
        match self {
            FileType::Photo => "jpg",
            FileType::Video => "mp4",
            FileType::Audio => "mp3",
        }
    }
}

impl Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FileType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "photo" => Ok(FileType::Photo),
            "video" => Ok(FileType::Video),
            "audio" => Ok(FileType::Audio),
            _ => Err(format!("Unknown file type: {s}")),
        }
    }
}

/// A single visual file of a post.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MediaFile {
    Photo { download_url: String },
    Video { download_url: String },
}

impl MediaFile {
    pub fn photo<S: Into<String>>(download_url: S) -> Self {
        MediaFile::Photo {
            download_url: download_url.into(),
        }
    }

    pub fn video<S: Into<String>>(download_url: S) -> Self {
        MediaFile::Video {
            download_url: download_url.into(),
        }
    }

    pub fn file_type(&self) -> FileType {
        match self {
            MediaFile::Photo { .. } => FileType::Photo,
            MediaFile::Video { .. } => FileType::Video,
        }
    }

    pub fn download_url(&self) -> &str {
        match self {
            MediaFile::Photo { download_url } | MediaFile::Video { download_url } => download_url,
        }
    }
}

/// The soundtrack attached to a photo carousel.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AudioFile {
    pub download_url: String,
    pub title: String,
    pub author: String,
}

impl AudioFile {
    pub fn new<U: Into<String>, T: Into<String>, A: Into<String>>(
        download_url: U,
        title: T,
        author: A,
    ) -> Self {
        Self {
            download_url: download_url.into(),
            title: title.into(),
            author: author.into(),
        }
    }

    pub fn file_type(&self) -> FileType {
        FileType::Audio
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_file_accessors() {
        let photo = MediaFile::photo("https://cdn.example.com/a.jpg");
        assert_eq!(photo.file_type(), FileType::Photo);
        assert_eq!(photo.download_url(), "https://cdn.example.com/a.jpg");

        let video = MediaFile::video("https://cdn.example.com/a.mp4");
        assert_eq!(video.file_type(), FileType::Video);
    }

    #[test]
    fn test_media_file_serializes_with_type_tag() {
        let json = serde_json::to_value(MediaFile::video("u")).unwrap();
        assert_eq!(json["type"], "video");
        assert_eq!(json["download_url"], "u");
    }

    #[test]
    fn test_file_type_from_str() {
        assert_eq!("Photo".parse::<FileType>().unwrap(), FileType::Photo);
        assert!("gif".parse::<FileType>().is_err());
    }
}
