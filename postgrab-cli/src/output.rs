use crate::{cli::OutputFormat, error::Result};
#[cfg(feature = "colored-output")]
use colored::*;
use platforms_fetcher::media::{MediaFile, Post};
use std::io::Write;

pub struct OutputManager {
    colored: bool,
}

impl OutputManager {
    pub fn new(colored: bool) -> Self {
        Self { colored }
    }

    pub fn format_post(&self, post: &Post, format: &OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Pretty => Ok(self.format_pretty(post)),
            OutputFormat::Json => Ok(format!("{}\n", serde_json::to_string_pretty(post)?)),
            OutputFormat::JsonCompact => Ok(format!("{}\n", serde_json::to_string(post)?)),
        }
    }

    fn field(&self, output: &mut String, name: &str, value: &str, tone: Tone) {
        output.push_str(&format!(
            "  {}: {}\n",
            self.paint(name, Tone::Label),
            self.paint(value, tone)
        ));
    }

    fn heading(&self, output: &mut String, text: &str) {
        output.push_str(&self.paint(text, Tone::Heading));
        output.push('\n');
    }

    fn format_pretty(&self, post: &Post) -> String {
        let mut output = String::new();

        self.heading(&mut output, "Post:");

        let kind = match post {
            Post::Single(_) => "single",
            Post::Multi(_) => "multi",
        };
        self.field(&mut output, "Type", kind, Tone::Value);
        self.field(&mut output, "Page", post.page_url(), Tone::Link);

        if let Post::Multi(multi) = post {
            if let Some(title) = &multi.title {
                self.field(&mut output, "Title", title, Tone::Value);
            }
        }
        if !post.description().is_empty() {
            self.field(&mut output, "Description", post.description(), Tone::Value);
        }

        output.push('\n');
        self.heading(&mut output, &format!("Files ({}):", post.files().len()));
        for (index, file) in post.files().iter().enumerate() {
            output.push_str(&self.format_file(index, file));
        }

        if let Some(audio) = post.audio() {
            output.push('\n');
            self.heading(&mut output, "Audio:");
            self.field(&mut output, "Title", &audio.title, Tone::Value);
            self.field(&mut output, "Author", &audio.author, Tone::Value);
            self.field(&mut output, "URL", &audio.download_url, Tone::Link);
        }

        output
    }

    fn format_file(&self, index: usize, file: &MediaFile) -> String {
        format!(
            "  {:>3}. {} {}\n",
            index + 1,
            self.paint(file.file_type().as_str(), Tone::Label),
            self.paint(file.download_url(), Tone::Link)
        )
    }

    pub fn format_platforms(
        &self,
        platforms: &[(&str, bool, &str)],
        format: &OutputFormat,
    ) -> Result<String> {
        match format {
            OutputFormat::Json | OutputFormat::JsonCompact => {
                let platforms_json: Vec<serde_json::Value> = platforms
                    .iter()
                    .map(|(name, enabled, pattern)| {
                        serde_json::json!({
                            "name": name,
                            "enabled": enabled,
                            "url_pattern": pattern
                        })
                    })
                    .collect();

                let output = if matches!(format, OutputFormat::Json) {
                    serde_json::to_string_pretty(&platforms_json)?
                } else {
                    serde_json::to_string(&platforms_json)?
                };
                Ok(format!("{output}\n"))
            }
            OutputFormat::Pretty => {
                let mut output = String::new();
                self.heading(&mut output, "Supported Platforms:");
                for (name, enabled, pattern) in platforms {
                    let state = if *enabled { "" } else { " (disabled)" };
                    output.push_str(&format!(
                        "  {} - {}{}\n",
                        self.paint(name, Tone::Name),
                        self.paint(pattern, Tone::Link),
                        state
                    ));
                }
                Ok(output)
            }
        }
    }

    pub fn success(&self, message: &str) -> String {
        format!("{} {}", self.paint("✓", Tone::Heading), message)
    }

    fn paint(&self, text: &str, tone: Tone) -> String {
        #[cfg(feature = "colored-output")]
        if self.colored {
            return match tone {
                Tone::Heading => text.green().bold(),
                Tone::Label => text.yellow(),
                Tone::Value => text.cyan(),
                Tone::Link => text.blue(),
                Tone::Name => text.cyan().bold(),
            }
            .to_string();
        }

        #[cfg(not(feature = "colored-output"))]
        let _ = (tone, self.colored);
        text.to_string()
    }
}

#[derive(Clone, Copy)]
enum Tone {
    Heading,
    Label,
    Value,
    Link,
    Name,
}

pub fn write_output(content: &str, output_file: Option<&std::path::Path>) -> Result<()> {
    match output_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, content)?;
        }
        None => {
            print!("{content}");
            std::io::stdout().flush()?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use platforms_fetcher::media::AudioFile;

    fn carousel() -> Post {
        Post::multi(
            "https://www.tiktok.com/@someone/photo/1",
            "three pictures",
            vec![
                MediaFile::photo("https://cdn/1.jpg"),
                MediaFile::photo("https://cdn/2.jpg"),
            ],
            Some("Holiday".to_string()),
            Some(AudioFile::new("https://cdn/a.mp3", "Song", "Band")),
        )
    }

    #[test]
    fn test_pretty_lists_files_in_order() {
        let output = OutputManager::new(false)
            .format_post(&carousel(), &OutputFormat::Pretty)
            .unwrap();

        assert!(output.contains("Title: Holiday"));
        assert!(output.contains("Files (2):"));
        let first = output.find("https://cdn/1.jpg").unwrap();
        let second = output.find("https://cdn/2.jpg").unwrap();
        assert!(first < second);
        assert!(output.contains("Author: Band"));
    }

    #[test]
    fn test_json_is_tagged() {
        let output = OutputManager::new(false)
            .format_post(&carousel(), &OutputFormat::JsonCompact)
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["type"], "multi");
        assert_eq!(value["files"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_write_output_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a").join("post.json");
        write_output("{}", Some(&path)).unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "{}");
    }
}
