use std::future::Future;

use reqwest::header::REFERER;
use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::fetcher::error::FetchError;
use crate::fetcher::platform_fetcher::{Fetcher, parse_set_cookies};
use crate::session::browser::{BrowserCookie, BrowserSession, PageLanding};

const CHALLENGE_INFO_PATH: &str = "/api/v1/challenge/web/?__coig_challenged=1";
const TAKE_CHALLENGE_PATH: &str =
    "/api/v1/bloks/apps/com.instagram.challenge.navigation.take_challenge/";

/// Whether a request ended on the anti-automation interstitial.
pub fn is_challenge_url(url: &str) -> bool {
    Url::parse(url)
        .ok()
        .and_then(|url| {
            url.path_segments()?
                .find(|s| !s.is_empty())
                .map(|s| s == "challenge")
        })
        .unwrap_or(false)
}

#[derive(Debug)]
enum ChallengeState {
    Request,
    ChallengeDetected,
    BypassAttempt(u32),
}

/// Loads a page, passing the challenge at most `max_attempts` times.
///
/// `Request -> ChallengeDetected -> BypassAttempt(n) -> Request`, until the
/// page loads or the attempt budget is spent. A rejected bypass fails at once.
pub async fn load_with_bypass<L, LF, B, BF>(
    max_attempts: u32,
    mut load: L,
    mut bypass: B,
) -> Result<PageLanding, FetchError>
where
    L: FnMut() -> LF,
    LF: Future<Output = Result<PageLanding, FetchError>>,
    B: FnMut(u32) -> BF,
    BF: Future<Output = Result<bool, FetchError>>,
{
    let mut state = ChallengeState::Request;
    let mut attempts = 0;

    loop {
        state = match state {
            ChallengeState::Request => {
                let landing = load().await?;
                if !is_challenge_url(&landing.url) {
                    return Ok(landing);
                }
                debug!("Redirected to challenge: {}", landing.url);
                ChallengeState::ChallengeDetected
            }
            ChallengeState::ChallengeDetected => {
                if attempts >= max_attempts {
                    return Err(FetchError::ChallengeUnresolved {
                        attempts,
                        reason: "still redirected to the challenge page".to_string(),
                    });
                }
                attempts += 1;
                ChallengeState::BypassAttempt(attempts)
            }
            ChallengeState::BypassAttempt(attempt) => match bypass(attempt).await {
                Ok(true) => {
                    info!("Passed Instagram challenge (attempt {})", attempt);
                    ChallengeState::Request
                }
                Ok(false) => {
                    return Err(FetchError::ChallengeUnresolved {
                        attempts: attempt,
                        reason: "challenge was rejected".to_string(),
                    });
                }
                Err(e) => {
                    return Err(FetchError::ChallengeUnresolved {
                        attempts: attempt,
                        reason: e.to_string(),
                    });
                }
            },
        };
    }
}

#[derive(Debug, Deserialize)]
struct ChallengeInfo {
    challenge_context: String,
}

const INSTAGRAM_COOKIE_DOMAIN: &str = ".instagram.com";

fn cookie_domain(base_url: &str) -> String {
    match Url::parse(base_url).ok().and_then(|u| u.host_str().map(str::to_string)) {
        Some(host) if host.ends_with("instagram.com") => INSTAGRAM_COOKIE_DOMAIN.to_string(),
        Some(host) => host,
        None => INSTAGRAM_COOKIE_DOMAIN.to_string(),
    }
}

/// `domain` itself or one of its subdomains.
fn on_domain(cookie: &BrowserCookie, domain: &str) -> bool {
    let domain = domain.trim_start_matches('.');
    let own = cookie.domain.trim_start_matches('.');
    own == domain
        || own
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

/// The session cookies that may be sent to `base_url`. Cookies of unrelated
/// sites in the same browser context are dropped.
pub fn platform_cookies(base_url: &str, cookies: Vec<BrowserCookie>) -> Vec<BrowserCookie> {
    let host = cookie_domain(base_url);
    cookies
        .into_iter()
        .filter(|c| on_domain(c, INSTAGRAM_COOKIE_DOMAIN) || on_domain(c, &host))
        .collect()
}

/// Requests the challenge context and submits it.
///
/// `fetcher` must already carry the session's cookies. Cookies set by either
/// response are copied back into `session`.
pub async fn bypass_challenge(
    fetcher: &Fetcher,
    base_url: &str,
    session: &dyn BrowserSession,
) -> Result<bool, FetchError> {
    let domain = cookie_domain(base_url);
    let mut fresh_cookies = Vec::new();

    let response = fetcher
        .send(fetcher.get(&format!("{base_url}{CHALLENGE_INFO_PATH}")))
        .await?;
    fresh_cookies.extend(parse_set_cookies(response.headers()));
    let body = response.text().await?;
    let info: ChallengeInfo = serde_json::from_str(&body)
        .map_err(|e| FetchError::invalid_schema("challenge info", e))?;

    let form = [
        ("challenge_context", info.challenge_context.as_str()),
        ("has_follow_up_screens", "false"),
        ("nest_data_manifest", "true"),
    ];
    let mut request = fetcher
        .post(&format!("{base_url}{TAKE_CHALLENGE_PATH}"))
        .header(REFERER, fetcher.url.as_str())
        .form(&form);
    if let Some(token) = fetcher.get_cookie("csrftoken") {
        request = request.header("x-csrftoken", token);
    }

    let passed = match fetcher.send(request).await {
        Ok(response) => {
            fresh_cookies.extend(parse_set_cookies(response.headers()));
            true
        }
        Err(FetchError::BadStatus { status, .. }) => {
            warn!("take_challenge answered {}", status);
            false
        }
        Err(e) => return Err(e),
    };

    if !fresh_cookies.is_empty() {
        let cookies: Vec<BrowserCookie> = fresh_cookies
            .into_iter()
            .map(|(name, value)| BrowserCookie::new(name, value, domain.as_str()))
            .collect();
        session.set_cookies(&cookies).await?;
    }

    Ok(passed)
}
