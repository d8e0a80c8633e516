//! Chromium backend built on `chromiumoxide`.
//!
//! Every launched session is an isolated browser context, so the shared
//! session and dedicated login sessions never see each other's cookies.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::network::{Cookie, CookieParam, TimeSinceEpoch};
use chromiumoxide::cdp::browser_protocol::page::{EventFrameNavigated, FrameId};
use chromiumoxide::cdp::browser_protocol::storage::{
    ClearCookiesParams, GetCookiesParams, SetCookiesParams,
};
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser, BrowserConfig, Handler, Page};
use futures::StreamExt;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::browser::{BrowserCookie, BrowserLauncher, BrowserPage, BrowserSession, PageLanding};
use crate::fetcher::error::FetchError;

const LOAD_TIMEOUT: Duration = Duration::from_secs(45);

fn cdp_error(e: CdpError) -> FetchError {
    FetchError::BrowserUnavailable(e.to_string())
}

#[derive(Debug, Clone)]
enum Backend {
    /// Browser websocket url or `http://host:port` debugging address
    Connect(String),
    Launch { headless: bool },
}

/// Opens browser sessions on a Chromium reachable over the DevTools protocol.
#[derive(Debug, Clone)]
pub struct CdpLauncher {
    backend: Backend,
}

impl CdpLauncher {
    /// Attaches to an already running Chromium.
    pub fn connect<S: Into<String>>(endpoint: S) -> Self {
        Self {
            backend: Backend::Connect(endpoint.into()),
        }
    }

    /// Starts a local Chromium process per session.
    pub fn local(headless: bool) -> Self {
        Self {
            backend: Backend::Launch { headless },
        }
    }

    async fn open(&self) -> Result<(Browser, Handler), FetchError> {
        match &self.backend {
            Backend::Connect(endpoint) => Browser::connect(endpoint.as_str())
                .await
                .map_err(|e| FetchError::BrowserUnavailable(format!("{endpoint}: {e}"))),
            Backend::Launch { headless } => {
                let mut builder = BrowserConfig::builder();
                if !headless {
                    builder = builder.with_head();
                }
                let config = builder.build().map_err(FetchError::BrowserUnavailable)?;
                Browser::launch(config).await.map_err(cdp_error)
            }
        }
    }
}

fn drive(mut handler: Handler) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                debug!("Browser connection stopped: {}", e);
                break;
            }
        }
    })
}

#[async_trait]
impl BrowserLauncher for CdpLauncher {
    async fn launch(&self) -> Result<Arc<dyn BrowserSession>, FetchError> {
        let (mut browser, handler) = self.open().await?;
        let handler = drive(handler);

        let context_id = match browser
            .create_browser_context(CreateBrowserContextParams::default())
            .await
        {
            Ok(id) => id,
            Err(e) => {
                handler.abort();
                return Err(cdp_error(e));
            }
        };
        debug!("Created browser context {:?}", context_id);

        let inspect_host = devtools_host(browser.websocket_address());
        Ok(Arc::new(CdpSession {
            browser: Mutex::new(browser),
            context_id,
            owns_process: matches!(self.backend, Backend::Launch { .. }),
            handler,
            inspect_host,
        }))
    }
}

fn devtools_host(ws_url: &str) -> Option<String> {
    let url = url::Url::parse(ws_url).ok()?;
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

pub struct CdpSession {
    browser: Mutex<Browser>,
    context_id: BrowserContextId,
    owns_process: bool,
    handler: JoinHandle<()>,
    inspect_host: Option<String>,
}

/// Session cookies carry no usable expiry.
fn cookie_expiry(expires: f64, session: bool) -> Option<f64> {
    (!session && expires > 0.0).then_some(expires)
}

impl From<Cookie> for BrowserCookie {
    fn from(cookie: Cookie) -> Self {
        BrowserCookie {
            expires: cookie_expiry(cookie.expires, cookie.session),
            name: cookie.name,
            value: cookie.value,
            domain: cookie.domain,
            path: cookie.path,
            http_only: cookie.http_only,
            secure: cookie.secure,
        }
    }
}

fn cookie_param(cookie: &BrowserCookie) -> CookieParam {
    let mut param = CookieParam::new(cookie.name.clone(), cookie.value.clone());
    param.domain = Some(cookie.domain.clone());
    param.path = Some(cookie.path.clone());
    param.secure = Some(cookie.secure);
    param.http_only = Some(cookie.http_only);
    param.expires = cookie.expires.map(TimeSinceEpoch::new);
    param
}

#[async_trait]
impl BrowserSession for CdpSession {
    async fn cookies(&self) -> Result<Vec<BrowserCookie>, FetchError> {
        let mut params = GetCookiesParams::default();
        params.browser_context_id = Some(self.context_id.clone());

        let response = self
            .browser
            .lock()
            .await
            .execute(params)
            .await
            .map_err(cdp_error)?;
        Ok(response
            .result
            .cookies
            .into_iter()
            .map(BrowserCookie::from)
            .collect())
    }

    async fn new_page(&self) -> Result<Arc<dyn BrowserPage>, FetchError> {
        let mut params = CreateTargetParams::new("about:blank");
        params.browser_context_id = Some(self.context_id.clone());

        let page = self
            .browser
            .lock()
            .await
            .new_page(params)
            .await
            .map_err(cdp_error)?;
        Ok(Arc::new(
            CdpPage::open(page, self.inspect_host.clone()).await?,
        ))
    }

    async fn set_cookies(&self, cookies: &[BrowserCookie]) -> Result<(), FetchError> {
        let mut params = SetCookiesParams::new(cookies.iter().map(cookie_param).collect());
        params.browser_context_id = Some(self.context_id.clone());

        self.browser
            .lock()
            .await
            .execute(params)
            .await
            .map_err(cdp_error)?;
        Ok(())
    }

    async fn delete_cookies(&self, cookies: &[BrowserCookie]) -> Result<(), FetchError> {
        let remaining: Vec<BrowserCookie> = self
            .cookies()
            .await?
            .into_iter()
            .filter(|c| !cookies.iter().any(|d| d.name == c.name && d.domain == c.domain))
            .collect();

        let mut params = ClearCookiesParams::default();
        params.browser_context_id = Some(self.context_id.clone());
        self.browser
            .lock()
            .await
            .execute(params)
            .await
            .map_err(cdp_error)?;

        if remaining.is_empty() {
            return Ok(());
        }
        self.set_cookies(&remaining).await
    }

    async fn close(&self) -> Result<(), FetchError> {
        let mut browser = self.browser.lock().await;
        let disposed = browser
            .execute(DisposeBrowserContextParams::new(self.context_id.clone()))
            .await
            .map_err(cdp_error);

        if self.owns_process {
            if let Err(e) = browser.close().await {
                warn!("Failed to close browser process: {}", e);
            }
        }
        self.handler.abort();
        disposed.map(|_| ())
    }
}

/// Only the main frame has no parent.
fn main_frame_url(parent_id: Option<&FrameId>, url: &str) -> Option<String> {
    match parent_id {
        Some(_) => None,
        None => Some(url.to_string()),
    }
}

pub struct CdpPage {
    page: Page,
    inspect_host: Option<String>,
    navigations: broadcast::Sender<String>,
    closed: Arc<AtomicBool>,
    listener: JoinHandle<()>,
}

impl CdpPage {
    async fn open(page: Page, inspect_host: Option<String>) -> Result<Self, FetchError> {
        let mut frames = page
            .event_listener::<EventFrameNavigated>()
            .await
            .map_err(cdp_error)?;

        let (navigations, _) = broadcast::channel(32);
        let closed = Arc::new(AtomicBool::new(false));

        let forward = navigations.clone();
        let page_closed = Arc::clone(&closed);
        let listener = tokio::spawn(async move {
            while let Some(event) = frames.next().await {
                if let Some(url) = main_frame_url(event.frame.parent_id.as_ref(), &event.frame.url)
                {
                    let _ = forward.send(url);
                }
            }
            page_closed.store(true, Ordering::SeqCst);
        });

        Ok(Self {
            page,
            inspect_host,
            navigations,
            closed,
            listener,
        })
    }
}

#[async_trait]
impl BrowserPage for CdpPage {
    async fn goto(&self, url: &str) -> Result<PageLanding, FetchError> {
        self.page.goto(url).await.map_err(|e| {
            FetchError::BrowserUnavailable(format!("navigation to {url} failed: {e}"))
        })?;

        // script driven redirects start after the first load
        match tokio::time::timeout(LOAD_TIMEOUT, self.page.wait_for_navigation()).await {
            Ok(result) => {
                result.map_err(cdp_error)?;
            }
            Err(_) => warn!("Page load not finished, reading current document"),
        }

        let landed = self
            .page
            .url()
            .await
            .map_err(cdp_error)?
            .unwrap_or_else(|| url.to_string());
        let body = self.page.content().await.map_err(cdp_error)?;

        Ok(PageLanding {
            url: landed,
            status: None,
            body,
        })
    }

    fn navigation_events(&self) -> broadcast::Receiver<String> {
        self.navigations.subscribe()
    }

    fn inspect_url(&self) -> Option<String> {
        self.inspect_host.as_ref().map(|host| {
            format!(
                "http://{host}/devtools/inspector.html?ws={host}/devtools/page/{}",
                self.page.target_id().inner()
            )
        })
    }

    async fn close(&self) -> Result<(), FetchError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.listener.abort();
        self.page.clone().close().await.map_err(cdp_error)
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
