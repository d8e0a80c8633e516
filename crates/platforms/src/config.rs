use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::fetcher::retry::RetryPolicy;

/// Read-only settings consumed by the dispatcher and the fetchers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformsConfig {
    /// Enable TikTok links
    pub tiktok_enabled: bool,

    /// Enable Instagram links
    pub instagram_enabled: bool,

    /// Maximum number of files downloaded and emitted together
    pub batch_size: usize,

    /// Retry policy for page loads and media downloads
    pub retry: RetryPolicy,

    /// How many times a challenge bypass is attempted before giving up
    pub challenge_attempts: u32,

    /// Directory holding `js/signature.js` and `js/webmssdk.js`
    pub assets_dir: Option<PathBuf>,

    /// Overrides `https://www.tiktok.com`, used by tests
    pub tiktok_base_url: Option<String>,

    /// Overrides `https://www.instagram.com`, used by tests
    pub instagram_base_url: Option<String>,
}

impl Default for PlatformsConfig {
    fn default() -> Self {
        Self {
            tiktok_enabled: true,
            instagram_enabled: true,
            batch_size: 10,
            retry: RetryPolicy::default(),
            challenge_attempts: 3,
            assets_dir: None,
            tiktok_base_url: None,
            instagram_base_url: None,
        }
    }
}

impl PlatformsConfig {
    pub fn assets_dir(&self) -> PathBuf {
        self.assets_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("assets"))
    }
}
