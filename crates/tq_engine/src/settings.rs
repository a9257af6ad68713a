use std::time::Duration;

use thiserror::Error;
use tq_core::DEFAULT_RECONNECT_DELAY;
use url::Url;

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8080";
pub const WEBSOCKET_PATH: &str = "/ws";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("invalid server url {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("unsupported url scheme {0:?} (expected http or https)")]
    UnsupportedScheme(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    /// Base HTTP url of the server; the websocket url is derived from it.
    pub server_url: String,
    pub reconnect_delay: Duration,
    pub request_timeout: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl ClientSettings {
    pub fn with_server_url(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            ..Self::default()
        }
    }

    fn base(&self) -> Result<Url, SettingsError> {
        let url = Url::parse(self.server_url.trim()).map_err(|source| SettingsError::InvalidUrl {
            url: self.server_url.clone(),
            source,
        })?;
        match url.scheme() {
            "http" | "https" | "ws" | "wss" => Ok(url),
            other => Err(SettingsError::UnsupportedScheme(other.to_string())),
        }
    }

    /// `http` becomes `ws`, `https` becomes `wss`; the path is always `/ws`.
    pub fn websocket_url(&self) -> Result<Url, SettingsError> {
        let mut url = self.base()?;
        let scheme = match url.scheme() {
            "https" | "wss" => "wss",
            _ => "ws",
        };
        // Both schemes are special, so switching between them cannot fail.
        let _ = url.set_scheme(scheme);
        url.set_path(WEBSOCKET_PATH);
        url.set_query(None);
        Ok(url)
    }

    /// Absolute url of a pull endpoint such as `/api/queue`.
    pub fn api_url(&self, path: &str) -> Result<Url, SettingsError> {
        let mut url = self.base()?;
        let scheme = match url.scheme() {
            "wss" => "https",
            "ws" => "http",
            other => other,
        }
        .to_string();
        let _ = url.set_scheme(&scheme);
        url.set_path(path);
        url.set_query(None);
        Ok(url)
    }
}
