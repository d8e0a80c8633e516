use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info};

use crate::fetcher::error::FetchError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowserCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default = "default_cookie_path")]
    pub path: String,
    #[serde(default)]
    pub expires: Option<f64>,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub secure: bool,
}

fn default_cookie_path() -> String {
    "/".to_string()
}

impl BrowserCookie {
    pub fn new<N: Into<String>, V: Into<String>, D: Into<String>>(
        name: N,
        value: V,
        domain: D,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: domain.into(),
            path: default_cookie_path(),
            expires: None,
            http_only: false,
            secure: true,
        }
    }
}

/// Formats cookies as a `Cookie` request header value.
pub fn cookie_header(cookies: &[BrowserCookie]) -> String {
    cookies
        .iter()
        .map(|c| format!("{}={}", c.name, c.value))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Where a navigation ended up.
#[derive(Debug, Clone)]
pub struct PageLanding {
    /// Final url after redirects
    pub url: String,
    pub status: Option<u16>,
    pub body: String,
}

#[async_trait]
pub trait BrowserPage: Send + Sync {
    async fn goto(&self, url: &str) -> Result<PageLanding, FetchError>;

    /// Urls of top-level navigations, including ones started by the user.
    fn navigation_events(&self) -> broadcast::Receiver<String>;

    /// Url an operator can open to interact with this page, if any.
    fn inspect_url(&self) -> Option<String> {
        None
    }

    async fn close(&self) -> Result<(), FetchError>;

    fn is_closed(&self) -> bool;
}

#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn cookies(&self) -> Result<Vec<BrowserCookie>, FetchError>;

    async fn new_page(&self) -> Result<Arc<dyn BrowserPage>, FetchError>;

    async fn set_cookies(&self, cookies: &[BrowserCookie]) -> Result<(), FetchError>;

    async fn delete_cookies(&self, cookies: &[BrowserCookie]) -> Result<(), FetchError>;

    async fn close(&self) -> Result<(), FetchError>;
}

#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Arc<dyn BrowserSession>, FetchError>;
}

/// Launcher used when no automation backend is configured.
#[derive(Debug, Clone)]
pub struct UnavailableLauncher {
    reason: String,
}

impl UnavailableLauncher {
    pub fn new<S: Into<String>>(reason: S) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl BrowserLauncher for UnavailableLauncher {
    async fn launch(&self) -> Result<Arc<dyn BrowserSession>, FetchError> {
        Err(FetchError::BrowserUnavailable(self.reason.clone()))
    }
}

/// Owner of the long-lived shared browser session.
///
/// The session is launched on the first `acquire` and handed out to every
/// caller afterwards; callers never own pages exclusively. Concurrent first
/// calls launch a single session.
pub struct BrowserManager {
    launcher: Arc<dyn BrowserLauncher>,
    shared: Mutex<Option<Arc<dyn BrowserSession>>>,
}

impl BrowserManager {
    pub fn new(launcher: Arc<dyn BrowserLauncher>) -> Self {
        Self {
            launcher,
            shared: Mutex::new(None),
        }
    }

    pub fn unavailable<S: Into<String>>(reason: S) -> Self {
        Self::new(Arc::new(UnavailableLauncher::new(reason)))
    }

    pub async fn acquire(&self) -> Result<Arc<dyn BrowserSession>, FetchError> {
        let mut shared = self.shared.lock().await;
        if let Some(session) = shared.as_ref() {
            return Ok(Arc::clone(session));
        }

        debug!("Launching shared browser session");
        let session = self.launcher.launch().await?;
        *shared = Some(Arc::clone(&session));
        info!("Shared browser session ready");
        Ok(session)
    }

    /// A fresh session that is not shared with fetches.
    pub async fn launch_dedicated(&self) -> Result<Arc<dyn BrowserSession>, FetchError> {
        self.launcher.launch().await
    }

    pub async fn is_running(&self) -> bool {
        self.shared.lock().await.is_some()
    }

    pub async fn shutdown(&self) -> Result<(), FetchError> {
        let session = self.shared.lock().await.take();
        if let Some(session) = session {
            debug!("Closing shared browser session");
            session.close().await?;
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::testing::FakeLauncher;
    use super::*;

    #[tokio::test]
    async fn test_acquire_launches_once() {
        let launcher = Arc::new(FakeLauncher::default());
        let manager = Arc::new(BrowserManager::new(launcher.clone()));

        let (a, b) = tokio::join!(manager.acquire(), manager.acquire());
        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
        assert_eq!(launcher.launches.load(Ordering::SeqCst), 1);
        assert!(manager.is_running().await);
    }

    #[tokio::test]
    async fn test_shutdown_closes_and_forgets_session() {
        let launcher = Arc::new(FakeLauncher::default());
        let manager = BrowserManager::new(launcher.clone());

        manager.acquire().await.unwrap();
        manager.shutdown().await.unwrap();
        assert!(launcher.session(0).closed.load(Ordering::SeqCst));
        assert!(!manager.is_running().await);

        manager.acquire().await.unwrap();
        assert_eq!(launcher.launches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_dedicated_session_is_not_shared() {
        let launcher = Arc::new(FakeLauncher::default());
        let manager = BrowserManager::new(launcher.clone());

        let shared = manager.acquire().await.unwrap();
        let dedicated = manager.launch_dedicated().await.unwrap();
        assert!(!Arc::ptr_eq(&shared, &dedicated));
        assert!(Arc::ptr_eq(&shared, &manager.acquire().await.unwrap()));
    }

    #[tokio::test]
    async fn test_unavailable_launcher() {
        let manager = BrowserManager::unavailable("no backend");
        assert!(matches!(
            manager.acquire().await,
            Err(FetchError::BrowserUnavailable(_))
        ));
        assert!(!manager.is_running().await);
    }

    #[test]
    fn test_cookie_header() {
        let cookies = vec![
            BrowserCookie::new("ds_user_id", "1", ".instagram.com"),
            BrowserCookie::new("sessionid", "abc", ".instagram.com"),
        ];
        assert_eq!(cookie_header(&cookies), "ds_user_id=1; sessionid=abc");
    }
}
