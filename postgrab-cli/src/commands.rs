use crate::{
    cli::OutputFormat,
    config::AppConfig,
    error::{CliError, Result},
    output::{OutputManager, write_output},
};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use platforms_fetcher::{
    fetcher::{
        Dispatcher, PlatformFetcher, ProxyConfig,
        caption::{CaptionBuilder, CaptionOptions},
        dispatcher_with_proxy,
        pipeline::PLACEHOLDER_IMAGE,
        platforms::instagram::{
            AuthMode, InstagramLogin, LoginOutcome, get_auth_mode, set_auth_mode,
        },
    },
    media::{ByteStream, FileType, Post, StreamBatch},
    session::{BrowserManager, CdpLauncher, JsonFileStore, KeyValueStore},
};
use std::{
    path::Path,
    sync::Arc,
    time::Duration,
};
use tokio::{io::AsyncWriteExt, time::timeout};
use tracing::{debug, info, warn};
use url::Url;

pub struct CommandExecutor {
    config: AppConfig,
    dispatcher: Dispatcher,
    output: OutputManager,
}

impl CommandExecutor {
    pub fn new(config: AppConfig, proxy_config: Option<ProxyConfig>) -> Result<Self> {
        let proxy_config = proxy_config.or_else(|| config.proxy_config());

        let store: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::in_dir(&config.data_dir));
        let browser = Arc::new(match &config.browser_ws_url {
            Some(endpoint) => {
                BrowserManager::new(Arc::new(CdpLauncher::connect(endpoint.as_str())))
            }
            None if config.launch_browser => {
                BrowserManager::new(Arc::new(CdpLauncher::local(config.browser_headless)))
            }
            None => BrowserManager::unavailable(
                "no browser_ws_url configured and launch_browser is off",
            ),
        });

        let dispatcher =
            dispatcher_with_proxy(proxy_config, config.platforms.clone(), store, browser)?;
        let output = OutputManager::new(config.colored_output);

        Ok(Self {
            config,
            dispatcher,
            output,
        })
    }

    pub fn default_timeout(&self) -> u64 {
        self.config.default_timeout
    }

    fn store(&self) -> &dyn KeyValueStore {
        self.dispatcher.context().store.as_ref()
    }

    fn instagram_login(&self) -> InstagramLogin {
        let context = self.dispatcher.context();
        InstagramLogin::new(
            Arc::clone(&context.browser),
            Arc::clone(&context.store),
            &context.config,
        )
    }

    fn find(&self, url: &str) -> Result<Box<dyn PlatformFetcher>> {
        self.dispatcher
            .find(url)
            .ok_or_else(|| CliError::unsupported_link(url))
    }

    async fn fetch_post(&self, fetcher: &dyn PlatformFetcher, seconds: u64) -> Result<Post> {
        let pb = create_spinner(&format!("Fetching {} post...", fetcher.name()));
        let result = timeout(Duration::from_secs(seconds), fetcher.fetch_post()).await;
        pb.finish_and_clear();

        match result {
            Ok(post) => Ok(post?),
            Err(_) => Err(CliError::timeout(seconds)),
        }
    }

    pub async fn fetch(
        &self,
        url: &str,
        output_format: Option<OutputFormat>,
        output_file: Option<&Path>,
        timeout_secs: u64,
    ) -> Result<()> {
        let fetcher = self.find(url)?;
        let post = self.fetch_post(fetcher.as_ref(), timeout_secs).await?;

        let format = output_format.unwrap_or(self.config.default_output_format);
        let output = self.output.format_post(&post, &format)?;
        write_output(&output, output_file)
    }

    pub async fn download(
        &self,
        url: &str,
        output_dir: Option<&Path>,
        with_caption: bool,
        timeout_secs: u64,
    ) -> Result<()> {
        let fetcher = self.find(url)?;
        let post = self.fetch_post(fetcher.as_ref(), timeout_secs).await?;

        let root = output_dir.unwrap_or(self.config.download_dir.as_path());
        let dir = root.join(post_dir_name(fetcher.name(), post.page_url()));
        tokio::fs::create_dir_all(&dir).await?;
        info!("Downloading {} file(s) to {}", post.files().len(), dir.display());

        let options = CaptionOptions {
            with_caption,
            include_page_url: self.config.include_page_url,
        };
        let batch_size = fetcher.get_fetcher().batch_size;

        let pb = create_progress_bar(post.files().len() as u64);
        let mut placeholders = 0;
        let mut batches = fetcher.generate_stream_batches(post.files());
        while let Some(batch) = batches.next().await {
            pb.set_message(format!("batch {}", batch.index + 1));

            let caption = batch_caption(&post, &batch, batch_size, options);
            if !caption.is_empty() {
                let path = dir.join(format!("caption-{:02}.txt", batch.index + 1));
                tokio::fs::write(path, caption).await?;
            }

            let first = batch.index * batch_size;
            for (offset, stream) in batch.streams.into_iter().enumerate() {
                let extension = if stream.is_placeholder {
                    "png"
                } else {
                    stream.file_type.extension()
                };
                let path = dir.join(format!("{:02}.{}", first + offset + 1, extension));
                if save_item(&path, stream.stream).await? || stream.is_placeholder {
                    placeholders += 1;
                }
                pb.inc(1);
            }
        }
        pb.finish_and_clear();

        if let Some(audio) = post.audio() {
            let path = dir.join(format!("audio.{}", FileType::Audio.extension()));
            let saved = match fetcher.get_byte_stream(&audio.download_url).await {
                Ok(stream) => save_stream(&path, stream).await,
                Err(e) => Err(std::io::Error::other(e)),
            };
            if let Err(e) = saved {
                warn!("Skipping audio track: {}", e);
            }
        }

        if placeholders > 0 {
            warn!("{} file(s) could not be downloaded", placeholders);
        }
        println!(
            "{}",
            self.output.success(&format!("Saved post to {}", dir.display()))
        );
        Ok(())
    }

    pub async fn list_platforms(&self, output_format: Option<OutputFormat>) -> Result<()> {
        let platforms: Vec<(&str, bool, &str)> = self
            .dispatcher
            .platforms()
            .into_iter()
            .map(|(name, enabled)| (name, enabled, url_pattern(name)))
            .collect();

        let format = output_format.unwrap_or(self.config.default_output_format);
        let output = self.output.format_platforms(&platforms, &format)?;
        write_output(&output, None)
    }

    pub async fn auth_mode(&self, mode: Option<AuthMode>) -> Result<()> {
        match mode {
            Some(mode) => {
                set_auth_mode(self.store(), mode).await?;
                println!(
                    "{}",
                    self.output
                        .success(&format!("Instagram auth mode set to {mode}"))
                );
            }
            None => {
                let mode = get_auth_mode(self.store()).await?;
                println!("{mode}");
            }
        }
        Ok(())
    }

    pub async fn login(&self, status_only: bool) -> Result<()> {
        let login = self.instagram_login();

        if status_only {
            let session = self.dispatcher.context().browser.acquire().await?;
            if login.restore_login_cookies(session.as_ref()).await? {
                println!("{}", self.output.success("Instagram login data present"));
            } else {
                println!("No Instagram login data");
            }
            return Ok(());
        }

        let handle = login.start().await?;
        match handle.inspect_url {
            Some(url) => println!("Complete the Instagram login at: {url}"),
            None => println!("Complete the Instagram login in the connected browser"),
        }

        match handle.outcome.await {
            Ok(LoginOutcome::Success) => {
                println!("{}", self.output.success("Logged in to Instagram"));
                Ok(())
            }
            Ok(LoginOutcome::Expired) => Err(CliError::LoginExpired),
            Err(_) => Err(CliError::LoginAborted),
        }
    }

    pub async fn logout(&self) -> Result<()> {
        self.instagram_login().clear_login_data().await?;
        println!("{}", self.output.success("Instagram login data removed"));
        Ok(())
    }

    /// Closes the shared browser session, if one was opened.
    pub async fn shutdown(&self) {
        if let Err(e) = self.dispatcher.context().browser.shutdown().await {
            debug!("Browser shutdown failed: {}", e);
        }
    }
}

fn url_pattern(platform: &str) -> &'static str {
    match platform {
        "TikTok" => "tiktok.com/@{user}/video/{id}, tiktok.com/@{user}/photo/{id}",
        "Instagram" => "instagram.com/p/{code}, instagram.com/reel/{code}",
        _ => "",
    }
}

fn batch_caption(
    post: &Post,
    batch: &StreamBatch,
    batch_size: usize,
    options: CaptionOptions,
) -> String {
    match post {
        Post::Single(single) if batch.index == 0 => CaptionBuilder::single(single, options),
        Post::Single(_) => String::new(),
        Post::Multi(multi) => CaptionBuilder::multi(multi, batch.index, batch_size, options),
    }
}

/// `<platform>-<last path segment>`, limited to file name safe characters.
fn post_dir_name(platform: &str, page_url: &str) -> String {
    let segment = Url::parse(page_url)
        .ok()
        .and_then(|url| {
            url.path_segments()?
                .filter(|s| !s.is_empty())
                .last()
                .map(str::to_string)
        })
        .unwrap_or_default();

    let segment: String = segment
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    let segment = if segment.is_empty() {
        "post".to_string()
    } else {
        segment
    };

    format!("{}-{}", platform.to_lowercase(), segment)
}

/// Writes `stream` to `path`. A broken stream leaves no partial file behind.
async fn save_stream(path: &Path, stream: ByteStream) -> std::io::Result<u64> {
    let result = write_stream(path, stream).await;
    if let Err(e) = &result {
        warn!("Failed to write {}: {}", path.display(), e);
        if let Err(e) = tokio::fs::remove_file(path).await {
            debug!("Could not remove partial file {}: {}", path.display(), e);
        }
    }
    result
}

/// Saves one post file. When its stream breaks midway the placeholder image
/// takes its slot as `.png`, so every file of the post keeps its number.
/// Returns whether the placeholder was written.
async fn save_item(path: &Path, stream: ByteStream) -> std::io::Result<bool> {
    if save_stream(path, stream).await.is_ok() {
        return Ok(false);
    }
    tokio::fs::write(path.with_extension("png"), PLACEHOLDER_IMAGE).await?;
    Ok(true)
}

async fn write_stream(path: &Path, mut stream: ByteStream) -> std::io::Result<u64> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut written = 0;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    debug!("Wrote {} bytes to {}", written, path.display());
    Ok(written)
}

fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.enable_steady_tick(Duration::from_millis(500));
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ "),
    );
    pb.set_message(message.to_string());
    pb
}

fn create_progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  "),
    );
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[test]
    fn test_post_dir_name() {
        assert_eq!(
            post_dir_name("TikTok", "https://www.tiktok.com/@someone/video/7350?lang=en"),
            "tiktok-7350"
        );
        assert_eq!(
            post_dir_name("Instagram", "https://www.instagram.com/p/C1a2b3/"),
            "instagram-C1a2b3"
        );
        assert_eq!(post_dir_name("Instagram", "not a url"), "instagram-post");
    }

    #[tokio::test]
    async fn test_write_stream_and_cleanup() {
        let dir = tempfile::tempdir().unwrap();

        let path = dir.path().join("01.jpg");
        let body: ByteStream = Box::pin(stream::iter(vec![
            Ok(bytes_of("ab")),
            Ok(bytes_of("cd")),
        ]));
        assert_eq!(write_stream(&path, body).await.unwrap(), 4);
        assert_eq!(std::fs::read(&path).unwrap(), b"abcd");

        let broken_path = dir.path().join("02.jpg");
        let broken: ByteStream = Box::pin(stream::iter(vec![
            Ok(bytes_of("ab")),
            Err(std::io::Error::other("reset")),
        ]));
        assert!(save_stream(&broken_path, broken).await.is_err());
        assert!(!broken_path.exists());
    }

    #[tokio::test]
    async fn test_broken_item_becomes_placeholder() {
        let dir = tempfile::tempdir().unwrap();

        let ok_path = dir.path().join("01.jpg");
        let ok: ByteStream = Box::pin(stream::iter(vec![Ok(bytes_of("ab"))]));
        assert!(!save_item(&ok_path, ok).await.unwrap());
        assert_eq!(std::fs::read(&ok_path).unwrap(), b"ab");

        let broken_path = dir.path().join("02.mp4");
        let broken: ByteStream = Box::pin(stream::iter(vec![
            Ok(bytes_of("ab")),
            Err(std::io::Error::other("reset")),
        ]));
        assert!(save_item(&broken_path, broken).await.unwrap());
        assert!(!broken_path.exists());
        assert_eq!(
            std::fs::read(dir.path().join("02.png")).unwrap(),
            PLACEHOLDER_IMAGE
        );
    }

    fn bytes_of(s: &'static str) -> bytes::Bytes {
        bytes::Bytes::from_static(s.as_bytes())
    }
}
