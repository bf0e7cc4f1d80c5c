//! Client configuration from environment variables.

use std::path::PathBuf;

/// Device web server's default port is 6672 and it serves the socket at `/ws`.
pub const DEFAULT_SERVER_URL: &str = "ws://localhost:6672/ws";

pub const DEFAULT_LOG_FILTER: &str = "vintagetv_client=info";

const APP_DIR_NAME: &str = "vintage-pi-tv";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Used by `connect()` when no server URL has been saved
    pub default_server_url: String,
    /// Where persisted settings live. `None` if the platform has no config dir.
    pub config_dir: Option<PathBuf>,
    /// Log filter used when `RUST_LOG` isn't set
    pub log_filter: String,
}

impl ClientConfig {
    /// Build configuration from environment variables.
    ///
    /// Environment variables:
    /// - `VINTAGETV_DEFAULT_URL`: fallback server URL (default: "ws://localhost:6672/ws")
    /// - `VINTAGETV_CONFIG_DIR`: settings directory (default: platform config dir + "vintage-pi-tv")
    /// - `VINTAGETV_LOG`: default log filter (default: "vintagetv_client=info")
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| var(key).filter(|value| !value.trim().is_empty());

        let default_server_url =
            non_empty("VINTAGETV_DEFAULT_URL").unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());
        let config_dir = non_empty("VINTAGETV_CONFIG_DIR")
            .map(PathBuf::from)
            .or_else(|| dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME)));
        let log_filter =
            non_empty("VINTAGETV_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        Self {
            default_server_url,
            config_dir,
            log_filter,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::from_vars(|_| None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_when_unset() {
        let config = ClientConfig::from_vars(|_| None);
        assert_eq!(config.default_server_url, DEFAULT_SERVER_URL);
        assert_eq!(config.log_filter, DEFAULT_LOG_FILTER);
    }

    #[test]
    fn env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("VINTAGETV_DEFAULT_URL", "wss://tv.example/ws"),
            ("VINTAGETV_CONFIG_DIR", "/tmp/vintagetv"),
            ("VINTAGETV_LOG", "debug"),
        ]);
        let config = ClientConfig::from_vars(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(config.default_server_url, "wss://tv.example/ws");
        assert_eq!(config.config_dir, Some(PathBuf::from("/tmp/vintagetv")));
        assert_eq!(config.log_filter, "debug");
    }

    #[test]
    fn blank_values_are_ignored() {
        let config = ClientConfig::from_vars(|key| {
            (key == "VINTAGETV_DEFAULT_URL").then(|| "  ".to_string())
        });
        assert_eq!(config.default_server_url, DEFAULT_SERVER_URL);
    }
}
