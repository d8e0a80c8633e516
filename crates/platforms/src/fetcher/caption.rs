use crate::media::{MultiPost, SinglePost};

const SINGLE_DESCRIPTION_LIMIT: usize = 900;
const MULTI_TITLE_LIMIT: usize = 100;
const MULTI_DESCRIPTION_LIMIT: usize = 800;
const PAGE_URL_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy)]
pub struct CaptionOptions {
    /// Include title and description text
    pub with_caption: bool,
    /// Append the source page url
    pub include_page_url: bool,
}

impl Default for CaptionOptions {
    fn default() -> Self {
        Self {
            with_caption: true,
            include_page_url: false,
        }
    }
}

/// Builds the text attached to the first stream of a batch.
pub struct CaptionBuilder;

impl CaptionBuilder {
    pub fn single(post: &SinglePost, options: CaptionOptions) -> String {
        let mut parts: Vec<String> = Vec::new();

        if options.with_caption && !post.description.is_empty() {
            parts.push(truncate(&post.description, SINGLE_DESCRIPTION_LIMIT));
        }

        if options.include_page_url {
            parts.push(truncate(&post.page_url, PAGE_URL_LIMIT));
        }

        parts.join("\n\n")
    }

    /// Caption of batch `batch_index`. Only the first batch carries the post
    /// text; every batch gets a page indicator once the post spans several.
    pub fn multi(
        post: &MultiPost,
        batch_index: usize,
        batch_size: usize,
        options: CaptionOptions,
    ) -> String {
        let batch_size = batch_size.max(1);
        let mut caption = String::new();

        if batch_index == 0 {
            let title = post.title.as_deref().filter(|t| !t.is_empty());

            if options.with_caption {
                if let Some(title) = title {
                    caption.push_str(&truncate(title, MULTI_TITLE_LIMIT));
                }

                if !post.description.is_empty() && Some(post.description.as_str()) != title {
                    if !caption.is_empty() {
                        caption.push('\n');
                    }
                    caption.push_str(&truncate(&post.description, MULTI_DESCRIPTION_LIMIT));
                }
            }

            if options.include_page_url {
                if !caption.is_empty() {
                    caption.push_str("\n\n");
                }
                caption.push_str(&truncate(&post.page_url, PAGE_URL_LIMIT));
            }
        }

        let total = post.files.len();
        if total > batch_size {
            let start = batch_index * batch_size + 1;
            let end = ((batch_index + 1) * batch_size).min(total);
            let current = if start == end {
                start.to_string()
            } else {
                format!("{start}–{end}")
            };

            if !caption.is_empty() {
                caption.push('\n');
            }
            caption.push_str(&format!("— Pages —\n{current}  out of  {total}"));
        }

        caption
    }
}

/// Shortens `s` to at most `max_len` characters, marking the cut with `…`.
pub fn truncate(s: &str, max_len: usize) -> String {
    if max_len == 0 {
        return String::new();
    }
    if s.chars().count() <= max_len {
        return s.to_string();
    }

    let mut out: String = s.chars().take(max_len - 1).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaFile;

    fn multi(count: usize, title: Option<&str>, description: &str) -> MultiPost {
        MultiPost {
            page_url: "https://www.tiktok.com/@user/photo/1".to_string(),
            description: description.to_string(),
            files: (0..count).map(|i| MediaFile::photo(i.to_string())).collect(),
            title: title.map(str::to_string),
            audio: None,
        }
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello", 5), "hello");
        assert_eq!(truncate("hello", 4), "hel…");
        assert_eq!(truncate("привет", 3), "пр…");
        assert_eq!(truncate("hello", 0), "");
    }

    #[test]
    fn test_first_batch_carries_text() {
        let post = multi(25, Some("Title"), "Description");
        let options = CaptionOptions::default();

        assert_eq!(
            CaptionBuilder::multi(&post, 0, 10, options),
            "Title\nDescription\n— Pages —\n1–10  out of  25"
        );
        assert_eq!(
            CaptionBuilder::multi(&post, 1, 10, options),
            "— Pages —\n11–20  out of  25"
        );
        assert_eq!(
            CaptionBuilder::multi(&post, 2, 10, options),
            "— Pages —\n21–25  out of  25"
        );
    }

    #[test]
    fn test_single_page_indicator_and_small_posts() {
        let post = multi(11, None, "Description");
        assert_eq!(
            CaptionBuilder::multi(&post, 1, 10, CaptionOptions::default()),
            "— Pages —\n11  out of  11"
        );

        let small = multi(3, Some("Same"), "Same");
        assert_eq!(
            CaptionBuilder::multi(&small, 0, 10, CaptionOptions::default()),
            "Same"
        );
    }

    #[test]
    fn test_caption_can_be_disabled() {
        let post = multi(2, Some("Title"), "Description");
        let options = CaptionOptions {
            with_caption: false,
            include_page_url: true,
        };
        assert_eq!(
            CaptionBuilder::multi(&post, 0, 10, options),
            "https://www.tiktok.com/@user/photo/1"
        );

        let single = SinglePost {
            page_url: "https://www.instagram.com/reel/x/".to_string(),
            description: "Vibing".to_string(),
            file: MediaFile::video("v"),
        };
        assert_eq!(
            CaptionBuilder::single(&single, CaptionOptions::default()),
            "Vibing"
        );
        assert_eq!(CaptionBuilder::single(&single, options), "https://www.instagram.com/reel/x/");
    }
}
