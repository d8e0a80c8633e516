use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::fetcher::error::FetchError;
use crate::session::store::{KeyValueStore, store_key};

/// How Instagram posts are resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Plain page requests without any account
    #[default]
    Anonymous,
    /// Page loads inside the logged-in shared browser session
    Authenticated,
}

impl AuthMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMode::Anonymous => "anonymous",
            AuthMode::Authenticated => "authenticated",
        }
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anonymous" => Ok(AuthMode::Anonymous),
            "authenticated" => Ok(AuthMode::Authenticated),
            other => Err(format!("unknown auth mode: {other}")),
        }
    }
}

fn auth_mode_key() -> String {
    store_key("instagram", "auth_mode")
}

/// Stored mode, `Anonymous` when unset or unreadable.
pub async fn get_auth_mode(store: &dyn KeyValueStore) -> Result<AuthMode, FetchError> {
    let Some(value) = store.get(&auth_mode_key()).await? else {
        return Ok(AuthMode::default());
    };

    Ok(value.parse().unwrap_or_else(|e| {
        warn!("{}, falling back to {}", e, AuthMode::default());
        AuthMode::default()
    }))
}

pub async fn set_auth_mode(store: &dyn KeyValueStore, mode: AuthMode) -> Result<(), FetchError> {
    info!("Setting new Instagram auth mode: {}", mode);
    store.set(&auth_mode_key(), mode.as_str()).await
}
