use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;
use url::Url;

use crate::fetcher::error::FetchError;

/// Environment the signing script observes.
#[derive(Debug, Clone, Default)]
pub struct SigningSession {
    pub user_agent: String,
    pub cookie_header: String,
}

/// Turns an unsigned api url into one the platform accepts.
#[async_trait]
pub trait SignatureProvider: Send + Sync {
    async fn sign(&self, unsigned_url: &str, session: &SigningSession)
    -> Result<String, FetchError>;
}

/// Appends `_signature` and then `X-Bogus` to `unsigned_url`.
///
/// `eval` runs a JS expression in the prepared sandbox and returns its string
/// result. `X-Bogus` is computed over the query that already carries
/// `_signature`.
pub(crate) fn sign_with<E>(unsigned_url: &str, mut eval: E) -> Result<String, FetchError>
where
    E: FnMut(&str) -> Result<String, FetchError>,
{
    let mut url = Url::parse(unsigned_url)
        .map_err(|e| FetchError::ParseFailed(format!("invalid url {unsigned_url}: {e}")))?;

    let signature = eval(&format!(
        "byted_acrawler.sign({{url: {}}})",
        js_string(url.as_str())
    ))?;
    url.query_pairs_mut().append_pair("_signature", &signature);

    let query = url.query().unwrap_or_default().to_string();
    let bogus = eval(&format!("_0x32d649({})", js_string(&query)))?;
    url.query_pairs_mut().append_pair("X-Bogus", &bogus);

    Ok(url.into())
}

fn js_string(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

/// Minimal browser globals the vendor scripts touch at load and sign time.
fn browser_prelude(session: &SigningSession) -> String {
    format!(
        r#"
var window = this;
var self = this;
var navigator = {{
    userAgent: {ua},
    appCodeName: "Mozilla",
    appName: "Netscape",
    appVersion: {ua},
    platform: "Win32",
    language: "en-US",
    languages: ["en-US", "en"],
    cookieEnabled: true,
    webdriver: false,
    hardwareConcurrency: 8,
    plugins: [],
    mimeTypes: []
}};
var location = {{
    href: "https://www.tiktok.com/",
    origin: "https://www.tiktok.com",
    protocol: "https:",
    host: "www.tiktok.com",
    hostname: "www.tiktok.com",
    pathname: "/",
    search: "",
    hash: ""
}};
var screen = {{ width: 1080, height: 1920, availWidth: 1080, availHeight: 1920, colorDepth: 24, pixelDepth: 24 }};
var document = {{
    cookie: {cookie},
    referrer: "",
    location: location,
    documentElement: {{}},
    body: {{}},
    createElement: function () {{ return {{ style: {{}}, getContext: function () {{ return null; }} }}; }},
    getElementById: function () {{ return null; }},
    getElementsByTagName: function () {{ return []; }},
    addEventListener: function () {{}}
}};
var innerWidth = 1080;
var innerHeight = 1920;
var setTimeout = function () {{ return 0; }};
var clearTimeout = function () {{}};
var setInterval = function () {{ return 0; }};
var clearInterval = function () {{}};
var addEventListener = function () {{}};
"#,
        ua = js_string(&session.user_agent),
        cookie = js_string(&session.cookie_header),
    )
}

/// Executes the vendor scripts `js/signature.js` and `js/webmssdk.js` in an
/// embedded JS engine. A fresh engine is built for every call.
#[derive(Debug, Clone)]
pub struct BoaSignatureProvider {
    assets_dir: PathBuf,
}

impl BoaSignatureProvider {
    pub fn new<P: Into<PathBuf>>(assets_dir: P) -> Self {
        Self {
            assets_dir: assets_dir.into(),
        }
    }

    async fn read_script(&self, name: &str) -> Result<String, FetchError> {
        let path = self.assets_dir.join("js").join(name);
        tokio::fs::read_to_string(&path).await.map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => {
                FetchError::JsError(format!("signing script missing: {}", path.display()))
            }
            _ => FetchError::Io(e),
        })
    }

    pub fn assets_dir(&self) -> &Path {
        &self.assets_dir
    }
}

#[async_trait]
impl SignatureProvider for BoaSignatureProvider {
    async fn sign(
        &self,
        unsigned_url: &str,
        session: &SigningSession,
    ) -> Result<String, FetchError> {
        let signature_js = self.read_script("signature.js").await?;
        let webmssdk_js = self.read_script("webmssdk.js").await?;
        let prelude = browser_prelude(session);
        let unsigned_url = unsigned_url.to_string();

        let signed = tokio::task::spawn_blocking(move || {
            sandbox::sign(&prelude, &signature_js, &webmssdk_js, &unsigned_url)
        })
        .await
        .map_err(|e| FetchError::JsError(format!("signing task failed: {e}")))??;

        debug!("Signed item detail url");
        Ok(signed)
    }
}

#[cfg(feature = "js-signing")]
mod sandbox {
    use boa_engine::{Context, Source};

    use super::sign_with;
    use crate::fetcher::error::FetchError;

    fn eval(context: &mut Context, code: &str) -> Result<boa_engine::JsValue, FetchError> {
        context
            .eval(Source::from_bytes(code.as_bytes()))
            .map_err(|e| FetchError::JsError(e.to_string()))
    }

    pub(super) fn sign(
        prelude: &str,
        signature_js: &str,
        webmssdk_js: &str,
        unsigned_url: &str,
    ) -> Result<String, FetchError> {
        let mut context = Context::default();
        eval(&mut context, prelude)?;
        eval(&mut context, signature_js)?;
        eval(&mut context, "byted_acrawler.init({aid: 24, dfp: true});")?;
        eval(&mut context, webmssdk_js)?;

        sign_with(unsigned_url, |expression| {
            let value = eval(&mut context, expression)?;
            value
                .as_string()
                .map(|s| s.to_std_string_escaped())
                .ok_or_else(|| FetchError::JsError(format!("{expression} returned no string")))
        })
    }
}

#[cfg(not(feature = "js-signing"))]
mod sandbox {
    use crate::fetcher::error::FetchError;

    pub(super) fn sign(
        _prelude: &str,
        _signature_js: &str,
        _webmssdk_js: &str,
        _unsigned_url: &str,
    ) -> Result<String, FetchError> {
        Err(FetchError::JsError(
            "built without the js-signing feature".to_string(),
        ))
    }
}
