use std::sync::Arc;

use reqwest::Client;
use tracing::debug;
use url::Url;

use super::platform_fetcher::PlatformFetcher;
use super::platforms::instagram::Instagram;
use super::platforms::tiktok::{BoaSignatureProvider, SignatureProvider, TikTok};
use crate::config::PlatformsConfig;
use crate::session::browser::BrowserManager;
use crate::session::store::KeyValueStore;

/// Collaborators handed to every fetcher the dispatcher creates.
#[derive(Clone)]
pub struct SharedContext {
    pub client: Client,
    pub config: PlatformsConfig,
    pub store: Arc<dyn KeyValueStore>,
    pub browser: Arc<BrowserManager>,
    pub signer: Arc<dyn SignatureProvider>,
}

impl SharedContext {
    pub fn new(
        client: Client,
        config: PlatformsConfig,
        store: Arc<dyn KeyValueStore>,
        browser: Arc<BrowserManager>,
    ) -> Self {
        let signer = Arc::new(BoaSignatureProvider::new(config.assets_dir()));
        Self {
            client,
            config,
            store,
            browser,
            signer,
        }
    }

    pub fn with_signer(mut self, signer: Arc<dyn SignatureProvider>) -> Self {
        self.signer = signer;
        self
    }
}

type FetcherConstructor = fn(String, &SharedContext) -> Box<dyn PlatformFetcher>;

struct PlatformEntry {
    name: &'static str,
    supports: fn(&Url) -> bool,
    enabled: fn(&PlatformsConfig) -> bool,
    constructor: FetcherConstructor,
}

macro_rules! create_constructor {
    ($name:ident, $builder:expr) => {
        fn $name(url: String, ctx: &SharedContext) -> Box<dyn PlatformFetcher> {
            Box::new($builder(url, ctx))
        }
    };
}

create_constructor!(new_tiktok, |url, ctx: &SharedContext| {
    TikTok::new(url, ctx.client.clone(), &ctx.config, Arc::clone(&ctx.signer))
});
create_constructor!(new_instagram, |url, ctx: &SharedContext| {
    Instagram::new(
        url,
        ctx.client.clone(),
        &ctx.config,
        Arc::clone(&ctx.store),
        Arc::clone(&ctx.browser),
    )
});

// Static platform registry, evaluated in order
static PLATFORMS: &[PlatformEntry] = &[
    PlatformEntry {
        name: "TikTok",
        supports: TikTok::supports_link,
        enabled: |config| config.tiktok_enabled,
        constructor: new_tiktok,
    },
    PlatformEntry {
        name: "Instagram",
        supports: Instagram::supports_link,
        enabled: |config| config.instagram_enabled,
        constructor: new_instagram,
    },
];

/// Maps links to the fetcher of the platform serving them.
pub struct Dispatcher {
    context: SharedContext,
}

impl Dispatcher {
    pub fn new(context: SharedContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &SharedContext {
        &self.context
    }

    /// Registered platforms with their enabled flag, in priority order.
    pub fn platforms(&self) -> Vec<(&'static str, bool)> {
        PLATFORMS
            .iter()
            .map(|p| (p.name, (p.enabled)(&self.context.config)))
            .collect()
    }

    /// Returns the first enabled fetcher supporting `url`, `None` when no
    /// platform matches.
    pub fn find(&self, url: &str) -> Option<Box<dyn PlatformFetcher>> {
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!("Not a link '{}': {}", url, e);
                return None;
            }
        };

        PLATFORMS
            .iter()
            .find(|p| (p.enabled)(&self.context.config) && (p.supports)(&parsed))
            .map(|p| {
                debug!("Dispatching {} to {}", url, p.name);
                (p.constructor)(url.to_string(), &self.context)
            })
    }
}
