use super::dispatcher::{Dispatcher, SharedContext};
use super::error::FetchError;
use crate::config::PlatformsConfig;
use crate::session::browser::BrowserManager;
use crate::session::store::KeyValueStore;
use reqwest::{Client, Proxy};
use rustls::{ClientConfig, crypto::ring};
use rustls_platform_verifier::BuilderVerifierExt;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub(crate) const DEFAULT_UA: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/136.0.0.0 Safari/537.36";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ProxyConfig {
    /// Proxy for every scheme; basic auth applies only with both credentials.
    fn to_proxy(&self) -> Result<Proxy, FetchError> {
        let proxy = Proxy::all(&self.url)?;
        Ok(match (&self.username, &self.password) {
            (Some(username), Some(password)) => proxy.basic_auth(username, password),
            _ => proxy,
        })
    }
}

pub fn default_client() -> Result<Client, FetchError> {
    create_client(None)
}

/// A rustls client verified against the platform trust store.
pub fn create_client(proxy_config: Option<ProxyConfig>) -> Result<Client, FetchError> {
    let tls_error = |e: rustls::Error| FetchError::Io(io::Error::other(e));
    let provider = Arc::new(ring::default_provider());
    let tls_config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(tls_error)?
        .with_platform_verifier()
        .map_err(tls_error)?
        .with_no_client_auth();

    let mut builder = Client::builder()
        .use_preconfigured_tls(tls_config)
        .timeout(REQUEST_TIMEOUT);

    if let Some(config) = proxy_config {
        debug!("Using proxy {}", config.url);
        builder = builder.proxy(config.to_proxy()?);
    }

    Ok(builder.build()?)
}

/// Returns a new `Dispatcher` populated with all the supported platforms.
pub fn default_dispatcher(
    config: PlatformsConfig,
    store: Arc<dyn KeyValueStore>,
    browser: Arc<BrowserManager>,
) -> Result<Dispatcher, FetchError> {
    dispatcher_with_proxy(None, config, store, browser)
}

/// Returns a new `Dispatcher` whose requests go through `proxy_config`.
pub fn dispatcher_with_proxy(
    proxy_config: Option<ProxyConfig>,
    config: PlatformsConfig,
    store: Arc<dyn KeyValueStore>,
    browser: Arc<BrowserManager>,
) -> Result<Dispatcher, FetchError> {
    let client = create_client(proxy_config)?;
    Ok(Dispatcher::new(SharedContext::new(client, config, store, browser)))
}
