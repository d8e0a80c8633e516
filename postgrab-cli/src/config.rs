use anyhow::{Context, Result};
use platforms_fetcher::config::PlatformsConfig;
use platforms_fetcher::fetcher::ProxyConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::cli::OutputFormat;

const APP_NAME: &str = "postgrab";

/// Settings read from `postgrab.toml`. Every field is optional in the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub default_output_format: OutputFormat,

    /// Seconds allowed for resolving one post
    pub default_timeout: u64,

    /// Holds the key/value store with the auth mode and login cookies
    pub data_dir: PathBuf,

    pub download_dir: PathBuf,

    /// Append the post link to captions
    pub include_page_url: bool,

    /// DevTools endpoint of a running Chromium, e.g. `http://127.0.0.1:9222`.
    /// Authenticated Instagram fetches and the login flow need it, or
    /// `launch_browser`.
    pub browser_ws_url: Option<String>,

    /// Start a local Chromium when no `browser_ws_url` is set
    pub launch_browser: bool,

    pub browser_headless: bool,

    pub colored_output: bool,

    pub proxy: Option<ProxySettings>,

    pub platforms: PlatformsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxySettings {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_output_format: OutputFormat::Pretty,
            default_timeout: 120,
            data_dir: PathBuf::from("postgrab-data"),
            download_dir: PathBuf::from("downloads"),
            include_page_url: false,
            browser_ws_url: None,
            launch_browser: false,
            browser_headless: true,
            colored_output: true,
            proxy: None,
            platforms: PlatformsConfig::default(),
        }
    }
}

impl AppConfig {
    /// Reads `config_path`, or the per-user confy file when none is given.
    /// A missing explicit file yields the defaults.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let Some(path) = config_path else {
            return confy::load(APP_NAME, None).context("Failed to load configuration");
        };
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn default_path() -> Result<PathBuf> {
        confy::get_configuration_file_path(APP_NAME, None)
            .context("No configuration path available")
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        confy::store_path(path, self)
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Writes the defaults and returns where they went.
    pub fn reset(config_path: Option<&Path>) -> Result<PathBuf> {
        let path = match config_path {
            Some(path) => path.to_path_buf(),
            None => Self::default_path()?,
        };
        Self::default().save(&path)?;
        Ok(path)
    }

    pub fn show(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }

    pub fn proxy_config(&self) -> Option<ProxyConfig> {
        self.proxy.as_ref().map(|proxy| ProxyConfig {
            url: proxy.url.clone(),
            username: proxy.username.clone(),
            password: proxy.password.clone(),
        })
    }
}
