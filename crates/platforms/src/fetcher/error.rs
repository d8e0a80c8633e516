use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    /// The url is well-formed but does not point to a post we know how to read.
    #[error("unsupported link: {0}")]
    LinkUnsupported(String),
    #[error("http error: {0}")]
    FetchFailed(#[from] reqwest::Error),
    #[error("unexpected status {status} for {url}")]
    BadStatus { url: String, status: u16 },
    #[error("response has no body: {0}")]
    EmptyBody(String),
    #[error("parse error: {0}")]
    ParseFailed(String),
    /// The response was found but did not match the expected shape.
    #[error("invalid {what}: {source}")]
    InvalidSchema {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("sign-in required: {0}")]
    SignInRequired(String),
    #[error("challenge unresolved after {attempts} attempt(s): {reason}")]
    ChallengeUnresolved { attempts: u32, reason: String },
    #[error("browser unavailable: {0}")]
    BrowserUnavailable(String),
    #[error("js error: {0}")]
    JsError(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store error: {0}")]
    Store(String),
}

impl FetchError {
    pub fn invalid_schema(what: &'static str, source: serde_json::Error) -> Self {
        Self::InvalidSchema { what, source }
    }

    /// Whether the failure is a transient network fault worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::FetchFailed(_) | FetchError::Io(_) | FetchError::EmptyBody(_) => true,
            FetchError::BadStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(
            FetchError::BadStatus {
                url: "u".to_string(),
                status: 503
            }
            .is_retryable()
        );
        assert!(
            !FetchError::BadStatus {
                url: "u".to_string(),
                status: 404
            }
            .is_retryable()
        );
        assert!(!FetchError::ParseFailed("missing".to_string()).is_retryable());

        let schema = serde_json::from_str::<u32>("\"x\"").unwrap_err();
        assert!(!FetchError::invalid_schema("media info", schema).is_retryable());
    }

    #[test]
    fn test_schema_error_keeps_diagnostics() {
        let source = serde_json::from_str::<u32>("\"x\"").unwrap_err();
        let message = FetchError::invalid_schema("item detail", source).to_string();
        assert!(message.starts_with("invalid item detail: invalid type"));
    }
}
