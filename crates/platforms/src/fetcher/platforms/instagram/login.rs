use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, broadcast, oneshot, watch};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::PlatformsConfig;
use crate::fetcher::error::FetchError;
use crate::session::browser::{BrowserCookie, BrowserManager, BrowserSession};
use crate::session::store::{KeyValueStore, store_key};

use super::builder::Instagram;

/// Cookies that exist only for a logged-in account.
pub const LOGIN_COOKIES: [&str; 2] = ["ds_user_id", "sessionid"];

/// A login page left open longer than this is abandoned.
pub const LOGIN_TIME_BOX: Duration = Duration::from_secs(3600);

fn is_instagram_cookie(cookie: &BrowserCookie) -> bool {
    cookie.domain.ends_with("instagram.com")
}

pub fn is_login_cookie(cookie: &BrowserCookie) -> bool {
    is_instagram_cookie(cookie) && LOGIN_COOKIES.contains(&cookie.name.as_str())
}

pub fn cookies_have_login_data(cookies: &[BrowserCookie]) -> bool {
    LOGIN_COOKIES
        .iter()
        .all(|name| cookies.iter().any(|c| is_instagram_cookie(c) && c.name == *name))
}

fn login_cookies_key() -> String {
    store_key("instagram", "login_cookies")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    Success,
    /// The time box ran out before the account page was reached
    Expired,
}

/// Returned by [`InstagramLogin::start`].
#[derive(Debug)]
pub struct LoginHandle {
    /// Where the operator completes the login, when the backend exposes one
    pub inspect_url: Option<String>,
    pub outcome: oneshot::Receiver<LoginOutcome>,
}

/// Single-fire completion. The sender is taken under the lock, so an empty
/// slot means the flow already finished.
struct Completion {
    sender: Mutex<Option<oneshot::Sender<LoginOutcome>>>,
    done: watch::Sender<bool>,
}

impl Completion {
    fn new(sender: oneshot::Sender<LoginOutcome>) -> Self {
        let (done, _) = watch::channel(false);
        Self {
            sender: Mutex::new(Some(sender)),
            done,
        }
    }

    /// Runs `action` and resolves with `outcome`, unless already resolved.
    async fn complete<F, Fut>(&self, outcome: LoginOutcome, action: F) -> Result<bool, FetchError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), FetchError>>,
    {
        let mut slot = self.sender.lock().await;
        if slot.is_none() {
            return Ok(false);
        }

        action().await?;

        if let Some(sender) = slot.take() {
            let _ = sender.send(outcome);
        }
        self.done.send_replace(true);
        Ok(true)
    }
}

struct LoginFlow {
    session: Arc<dyn BrowserSession>,
    browser: Arc<BrowserManager>,
    store: Arc<dyn KeyValueStore>,
    base_host: Option<String>,
    completion: Completion,
}

impl LoginFlow {
    fn is_account_settings(&self, url: &str) -> bool {
        let Ok(url) = Url::parse(url) else {
            return false;
        };
        let Some(host) = url.host_str() else {
            return false;
        };
        if !host.ends_with("instagram.com") && self.base_host.as_deref() != Some(host) {
            return false;
        }

        url.path_segments()
            .map(|segments| segments.filter(|s| !s.is_empty()).eq(["accounts", "edit"]))
            .unwrap_or(false)
    }

    async fn finish_if_logged_in(&self) -> Result<(), FetchError> {
        let cookies = self.session.cookies().await?;
        if !cookies_have_login_data(&cookies) {
            debug!("Account page reached without login cookies");
            return Ok(());
        }

        self.completion
            .complete(LoginOutcome::Success, || async {
                info!("Instagram login successful");

                let shared = self.browser.acquire().await?;
                shared.set_cookies(&cookies).await?;
                persist_login_cookies(self.store.as_ref(), &cookies).await?;

                self.session.close().await
            })
            .await?;
        Ok(())
    }

    async fn expire(&self) -> Result<(), FetchError> {
        self.completion
            .complete(LoginOutcome::Expired, || async {
                info!("Instagram login expired");
                self.session.close().await
            })
            .await?;
        Ok(())
    }
}

async fn watch_navigations(
    flow: Arc<LoginFlow>,
    mut navigations: broadcast::Receiver<String>,
    time_box: Duration,
) {
    let mut done = flow.completion.done.subscribe();
    let expiry = tokio::time::sleep(time_box);
    tokio::pin!(expiry);
    let mut listening = true;

    loop {
        tokio::select! {
            _ = &mut expiry => {
                if let Err(e) = flow.expire().await {
                    warn!("Failed to close expired login session: {}", e);
                }
                break;
            }
            _ = done.changed() => break,
            event = navigations.recv(), if listening => match event {
                Ok(url) if flow.is_account_settings(&url) => {
                    let flow = Arc::clone(&flow);
                    tokio::spawn(async move {
                        if let Err(e) = flow.finish_if_logged_in().await {
                            warn!("Failed to complete Instagram login: {}", e);
                        }
                    });
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("Login flow skipped {} navigations", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => listening = false,
            },
        }
    }
}

async fn persist_login_cookies(
    store: &dyn KeyValueStore,
    cookies: &[BrowserCookie],
) -> Result<(), FetchError> {
    let instagram: Vec<&BrowserCookie> = cookies.iter().filter(|c| is_instagram_cookie(c)).collect();
    let value = serde_json::to_string(&instagram)
        .map_err(|e| FetchError::Store(format!("failed to serialize cookies: {e}")))?;
    store.set(&login_cookies_key(), &value).await
}

/// Interactive login and the login data it leaves behind.
pub struct InstagramLogin {
    browser: Arc<BrowserManager>,
    store: Arc<dyn KeyValueStore>,
    base_url: String,
    time_box: Duration,
}

impl InstagramLogin {
    pub fn new(
        browser: Arc<BrowserManager>,
        store: Arc<dyn KeyValueStore>,
        config: &PlatformsConfig,
    ) -> Self {
        Self {
            browser,
            store,
            base_url: config
                .instagram_base_url
                .clone()
                .unwrap_or_else(|| Instagram::BASE_URL.to_string()),
            time_box: LOGIN_TIME_BOX,
        }
    }

    pub fn with_time_box(mut self, time_box: Duration) -> Self {
        self.time_box = time_box;
        self
    }

    fn login_url(&self) -> Result<Url, FetchError> {
        let mut url = Url::parse(&format!("{}/accounts/login", self.base_url))
            .map_err(|e| FetchError::ParseFailed(format!("invalid base url: {e}")))?;
        url.query_pairs_mut()
            .append_pair("next", &format!("{}/accounts/edit", self.base_url));
        Ok(url)
    }

    /// Opens the login page in a dedicated session and watches it.
    ///
    /// The handle resolves with `Success` once the account page is reached
    /// with login cookies present, or `Expired` after the time box.
    pub async fn start(&self) -> Result<LoginHandle, FetchError> {
        let login_url = self.login_url()?;
        let session = self.browser.launch_dedicated().await?;
        let page = session.new_page().await?;
        let navigations = page.navigation_events();
        let inspect_url = page.inspect_url();

        let (sender, outcome) = oneshot::channel();
        let flow = Arc::new(LoginFlow {
            session,
            browser: Arc::clone(&self.browser),
            store: Arc::clone(&self.store),
            base_host: Url::parse(&self.base_url)
                .ok()
                .and_then(|u| u.host_str().map(str::to_string)),
            completion: Completion::new(sender),
        });

        tokio::spawn(async move {
            if let Err(e) = page.goto(login_url.as_str()).await {
                warn!("Login page did not load: {}", e);
            }
        });
        tokio::spawn(watch_navigations(flow, navigations, self.time_box));

        info!("Instagram login flow started");
        Ok(LoginHandle {
            inspect_url,
            outcome,
        })
    }

    /// Login cookies currently held by the shared session.
    pub async fn login_cookies(&self) -> Result<Vec<BrowserCookie>, FetchError> {
        let session = self.browser.acquire().await?;
        Ok(session
            .cookies()
            .await?
            .into_iter()
            .filter(is_login_cookie)
            .collect())
    }

    pub async fn clear_login_data(&self) -> Result<(), FetchError> {
        info!("Clearing Instagram login data");
        self.store.delete(&login_cookies_key()).await?;

        match self.browser.acquire().await {
            Ok(session) => {
                let cookies = self.login_cookies().await?;
                session.delete_cookies(&cookies).await
            }
            Err(FetchError::BrowserUnavailable(reason)) => {
                warn!("Browser unavailable, only stored login data was cleared: {}", reason);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Copies persisted login cookies into `session` when it has none.
    pub async fn restore_login_cookies(
        &self,
        session: &dyn BrowserSession,
    ) -> Result<bool, FetchError> {
        if cookies_have_login_data(&session.cookies().await?) {
            return Ok(true);
        }

        let Some(stored) = self.store.get(&login_cookies_key()).await? else {
            return Ok(false);
        };
        let cookies: Vec<BrowserCookie> = match serde_json::from_str(&stored) {
            Ok(cookies) => cookies,
            Err(e) => {
                warn!("Ignoring unreadable stored login cookies: {}", e);
                return Ok(false);
            }
        };
        if !cookies_have_login_data(&cookies) {
            return Ok(false);
        }

        debug!("Restoring {} stored Instagram cookies", cookies.len());
        session.set_cookies(&cookies).await?;
        Ok(true)
    }
}
