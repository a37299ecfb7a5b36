// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub providers: Vec<ProviderConfig>,
    pub player: PlayerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub tracker: TrackerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub url: String,
    pub username: String,
    pub password: String,
}

impl ProviderConfig {
    /// Name shown to the user, falling back to `user@url`
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("{}@{}", self.username, self.url))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    pub command: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding the per-provider favorites/recents files.
    /// Defaults to `<config dir>/xtream-dash/store`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    pub max_recent: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_recent: crate::tracker::MAX_RECENT_CHANNELS,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            providers: vec![ProviderConfig {
                name: Some("Example Provider".to_string()),
                url: "https://your-server.com:port".to_string(),
                username: "your-username".to_string(),
                password: "your-password".to_string(),
            }],
            player: PlayerConfig {
                command: "mpv".to_string(),
                args: vec!["--fs".to_string(), "--quiet".to_string()],
            },
            store: StoreConfig::default(),
            tracker: TrackerConfig::default(),
        }
    }
}

impl Config {
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|p| p.join("xtream-dash").join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Config =
            toml::from_str(&content).with_context(|| "Failed to parse TOML configuration")?;

        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content =
            toml::to_string_pretty(self).with_context(|| "Failed to serialize config to TOML")?;

        if let Some(parent) = path.as_ref().parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(&path, content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// Directory used by the file store, honouring `[store] dir`
    pub fn store_dir(&self) -> PathBuf {
        self.store.dir.clone().unwrap_or_else(|| {
            dirs::config_dir()
                .map(|p| p.join("xtream-dash").join("store"))
                .unwrap_or_else(|| PathBuf::from("store"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_section_defaults() {
        let toml = r#"
[[providers]]
url = "http://example.com:8080"
username = "user"
password = "pass"

[player]
command = "mpv"
args = []
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.providers.len(), 1);
        assert_eq!(config.tracker.max_recent, 10);
        assert!(config.store.dir.is_none());
        assert_eq!(
            config.providers[0].display_name(),
            "user@http://example.com:8080"
        );
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.tracker.max_recent = 5;
        config.store.dir = Some(dir.path().join("store"));
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.tracker.max_recent, 5);
        assert_eq!(loaded.store_dir(), dir.path().join("store"));
        assert_eq!(loaded.player.command, "mpv");
    }

}
