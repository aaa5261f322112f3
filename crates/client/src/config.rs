// Local client configuration.
//
// Global config: `~/.cahier/config.toml`

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::realtime::ReconnectPolicy;

/// Root directory for Cahier client state: `~/.cahier/`.
pub fn global_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".cahier"))
}

/// Path to the global config file: `~/.cahier/config.toml`.
pub fn global_config_path() -> Option<PathBuf> {
    global_dir().map(|d| d.join("config.toml"))
}

// ── Client config ──────────────────────────────────────────────────

/// Client configuration at `~/.cahier/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// REST API base URL (e.g. `https://api.cahier.app`).
    pub api_url: Option<String>,
    /// Channel registry WebSocket URL (e.g. `wss://rt.cahier.app/v1/ws`).
    pub ws_url: Option<String>,
    /// Display name announced in presence.
    pub display_name: Option<String>,
    /// Reconnection tuning.
    pub realtime: RealtimeSection,
}

impl ClientConfig {
    /// Load from `~/.cahier/config.toml`. Returns defaults if the file
    /// doesn't exist or can't be parsed.
    pub fn load() -> Self {
        global_config_path().and_then(|p| Self::load_from(&p).ok()).unwrap_or_default()
    }

    /// Load from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        toml::from_str(&contents).map_err(ConfigError::Parse)
    }

    /// Save to `~/.cahier/config.toml`.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = global_config_path().ok_or_else(|| {
            ConfigError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "could not determine home directory",
            ))
        })?;
        self.save_to(&path)
    }

    /// Save to a specific path (creates parent directories).
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigError::Io)?;
        }
        let contents = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Reconnection tuning for the realtime connection.
///
/// Bearer tokens are issued by the auth flow and held in memory; a
/// `token` key in this section is rejected at parse time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct RealtimeSection {
    /// Base backoff delay in milliseconds.
    pub reconnect_base_ms: u64,
    /// Backoff cap in seconds.
    pub reconnect_max_secs: u64,
    /// Maximum reconnection attempts (unset = retry indefinitely).
    pub max_attempts: Option<u32>,
}

impl Default for RealtimeSection {
    fn default() -> Self {
        Self { reconnect_base_ms: 250, reconnect_max_secs: 30, max_attempts: None }
    }
}

impl RealtimeSection {
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            base_delay: Duration::from_millis(self.reconnect_base_ms),
            max_delay: Duration::from_secs(self.reconnect_max_secs),
            max_attempts: self.max_attempts.unwrap_or(u32::MAX),
        }
    }
}

// ── Errors ─────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Serialize(toml::ser::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "config I/O error: {e}"),
            Self::Parse(e) => write!(f, "config parse error: {e}"),
            Self::Serialize(e) => write!(f, "config serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults() {
        let cfg = ClientConfig::default();
        assert!(cfg.api_url.is_none());
        assert!(cfg.ws_url.is_none());
        assert_eq!(cfg.realtime.reconnect_base_ms, 250);
        assert_eq!(cfg.realtime.reconnect_max_secs, 30);
        assert!(cfg.realtime.max_attempts.is_none());
    }

    #[test]
    fn roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let cfg = ClientConfig {
            api_url: Some("https://api.cahier.app".into()),
            ws_url: Some("wss://rt.cahier.app/v1/ws".into()),
            display_name: Some("Alice".into()),
            realtime: RealtimeSection {
                reconnect_base_ms: 100,
                reconnect_max_secs: 10,
                max_attempts: Some(5),
            },
        };
        cfg.save_to(&path).unwrap();
        let loaded = ClientConfig::load_from(&path).unwrap();
        assert_eq!(cfg, loaded);
    }

    #[test]
    fn parse_from_toml() {
        let toml_str = r#"
api_url = "https://api.cahier.app"
ws_url = "wss://rt.cahier.app/v1/ws"
display_name = "Bob"

[realtime]
reconnect_base_ms = 500
"#;
        let cfg: ClientConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.ws_url.as_deref(), Some("wss://rt.cahier.app/v1/ws"));
        assert_eq!(cfg.realtime.reconnect_base_ms, 500);
        assert_eq!(cfg.realtime.reconnect_max_secs, 30); // default
    }

    #[test]
    fn rejects_plaintext_token() {
        let toml_str = r#"
[realtime]
token = "bearer-prod"
"#;
        let error = toml::from_str::<ClientConfig>(toml_str).expect_err("parse should fail");
        assert!(error.to_string().contains("unknown field `token`"));
    }

    #[test]
    fn missing_fields_use_defaults() {
        let cfg: ClientConfig = toml::from_str("").unwrap();
        assert_eq!(cfg, ClientConfig::default());
    }

    #[test]
    fn reconnect_policy_mapping() {
        let section =
            RealtimeSection { reconnect_base_ms: 100, reconnect_max_secs: 5, max_attempts: None };
        let policy = section.reconnect_policy();
        assert_eq!(policy.base_delay, Duration::from_millis(100));
        assert_eq!(policy.max_delay, Duration::from_secs(5));
        assert_eq!(policy.max_attempts, u32::MAX);
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("deep").join("nested").join("config.toml");

        ClientConfig::default().save_to(&path).unwrap();
        assert!(path.exists());
    }
}
