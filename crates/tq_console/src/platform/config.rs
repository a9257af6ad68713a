use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tq_engine::ClientSettings;

use super::logging::LogDestination;

pub(crate) const CONFIG_FILENAME: &str = "tq_console.ron";

/// Contents of `tq_console.ron`. Every field is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct ConsoleConfig {
    pub server_url: Option<String>,
    pub reconnect_delay_secs: u64,
    pub request_timeout_secs: u64,
    /// Refresh period of pull mode.
    pub poll_interval_secs: u64,
    pub log_destination: LogDestination,
    pub pull: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        let settings = ClientSettings::default();
        Self {
            server_url: None,
            reconnect_delay_secs: settings.reconnect_delay.as_secs(),
            request_timeout_secs: settings.request_timeout.as_secs(),
            poll_interval_secs: 2,
            log_destination: LogDestination::default(),
            pull: false,
        }
    }
}

impl ConsoleConfig {
    /// `server_override` comes from `--server` or `TQ_SERVER_URL` and wins over the file.
    pub fn client_settings(&self, server_override: Option<&str>) -> ClientSettings {
        let defaults = ClientSettings::default();
        let server_url = server_override
            .map(str::to_owned)
            .or_else(|| self.server_url.clone())
            .unwrap_or(defaults.server_url);
        ClientSettings {
            server_url,
            reconnect_delay: Duration::from_secs(self.reconnect_delay_secs.max(1)),
            request_timeout: Duration::from_secs(self.request_timeout_secs.max(1)),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

/// Reads the config file.
///
/// A missing file yields defaults silently. An unreadable or invalid file
/// yields defaults plus a warning for the caller to log once logging is up.
pub(crate) fn load_config(path: &Path) -> (ConsoleConfig, Option<String>) {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return (ConsoleConfig::default(), None);
        }
        Err(err) => {
            return (
                ConsoleConfig::default(),
                Some(format!("Failed to read config from {:?}: {}", path, err)),
            );
        }
    };

    match ron::from_str(&content) {
        Ok(config) => (config, None),
        Err(err) => (
            ConsoleConfig::default(),
            Some(format!("Failed to parse config from {:?}: {}", path, err)),
        ),
    }
}
