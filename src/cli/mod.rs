// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use anyhow::Result;
use inquire::Select;
use serde::Serialize;
use tracing::{debug, warn};

use xtream_dash::config::ProviderConfig;
use xtream_dash::{Config, Dashboard, FileStore, KeyValueStore, MemoryStore, Tracker, XTreamAPI};

pub mod categories;
pub mod epg;
pub mod episodes;
pub mod list;
pub mod play;
pub mod tracker;

pub use categories::CategoriesCommand;
pub use epg::EpgCommand;
pub use episodes::EpisodesCommand;
pub use list::ListCommand;
pub use play::PlayCommand;
pub use tracker::{FavoriteCommand, RecentCommand};

pub type SessionDashboard = Dashboard<Box<dyn KeyValueStore>>;

/// Output format for command results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => anyhow::bail!("Invalid format: {}. Use 'text' or 'json'", s),
        }
    }
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Context for command execution with provider management
pub struct CommandContext {
    pub config: Config,
    pub selected_provider: Option<String>,
}

impl CommandContext {
    pub fn new(config: Config, selected_provider: Option<String>) -> Self {
        Self {
            config,
            selected_provider,
        }
    }

    /// Resolve the provider to talk to and build its API client
    pub fn get_single_provider(&self) -> Result<(XTreamAPI, String)> {
        let providers = &self.config.providers;
        if providers.is_empty() {
            anyhow::bail!("No providers configured. Please add provider details to config.toml.");
        }

        let provider = if let Some(name) = &self.selected_provider {
            find_provider(providers, name)
                .ok_or_else(|| anyhow::anyhow!("Provider '{}' not found", name))?
        } else if providers.len() == 1 {
            &providers[0]
        } else {
            self.prompt_provider_selection()?
        };

        let provider_name = provider.display_name();
        let api = XTreamAPI::new(
            provider.url.clone(),
            provider.username.clone(),
            provider.password.clone(),
        )?;

        Ok((api, provider_name))
    }

    /// Store for `api`'s provider. Falls back to memory when the file store
    /// cannot be opened, so tracking still works for this run.
    pub fn open_store(&self, api: &XTreamAPI) -> Box<dyn KeyValueStore> {
        match FileStore::for_provider(self.config.store_dir(), api.base_url()) {
            Ok(store) => {
                debug!("Using store {}", store.path().display());
                Box::new(store)
            }
            Err(e) => {
                warn!("Favorites and recents will not be saved: {}", e);
                Box::new(MemoryStore::new())
            }
        }
    }

    pub fn open_dashboard(&self) -> Result<(SessionDashboard, String)> {
        let (api, provider_name) = self.get_single_provider()?;
        let store = self.open_store(&api);
        let tracker = Tracker::load(store, self.config.tracker.max_recent);
        Ok((Dashboard::new(api, tracker), provider_name))
    }

    fn prompt_provider_selection(&self) -> Result<&ProviderConfig> {
        let provider_names: Vec<String> = self
            .config
            .providers
            .iter()
            .map(ProviderConfig::display_name)
            .collect();

        let selection = Select::new("Select provider:", provider_names).prompt()?;

        self.config
            .providers
            .iter()
            .find(|p| p.display_name() == selection)
            .ok_or_else(|| anyhow::anyhow!("Provider not found"))
    }
}

/// Case-insensitive lookup by configured name
pub fn find_provider<'a>(providers: &'a [ProviderConfig], name: &str) -> Option<&'a ProviderConfig> {
    providers.iter().find(|p| {
        p.name
            .as_ref()
            .is_some_and(|n| n.eq_ignore_ascii_case(name))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(name: Option<&str>, url: &str) -> ProviderConfig {
        ProviderConfig {
            name: name.map(str::to_string),
            url: url.to_string(),
            username: "user".to_string(),
            password: "pass".to_string(),
        }
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!(OutputFormat::from_str("JSON").unwrap(), OutputFormat::Json);
        assert_eq!(OutputFormat::from_str("text").unwrap(), OutputFormat::Text);
        assert!(OutputFormat::from_str("m3u").is_err());
    }

    #[test]
    fn test_find_provider_ignores_case() {
        let providers = vec![
            provider(Some("Home"), "http://a.example.com"),
            provider(None, "http://b.example.com"),
        ];
        assert_eq!(
            find_provider(&providers, "home").map(|p| p.url.as_str()),
            Some("http://a.example.com")
        );
        assert!(find_provider(&providers, "work").is_none());
    }

    #[test]
    fn test_selected_provider_builds_api() {
        let mut config = Config::default();
        config.providers = vec![
            provider(Some("Home"), "http://a.example.com"),
            provider(Some("Work"), "http://b.example.com:8080/"),
        ];

        let context = CommandContext::new(config, Some("WORK".to_string()));
        let (api, name) = context.get_single_provider().unwrap();
        assert_eq!(name, "Work");
        assert_eq!(api.base_url(), "http://b.example.com:8080");

        let missing = CommandContext::new(Config::default(), Some("Nope".to_string()));
        assert!(missing.get_single_provider().is_err());
    }

    #[test]
    fn test_dashboard_uses_configured_store_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.providers = vec![provider(Some("Home"), "http://a.example.com")];
        config.store.dir = Some(dir.path().to_path_buf());

        let context = CommandContext::new(config, None);
        let (mut dash, _) = context.open_dashboard().unwrap();
        assert!(dash.toggle_favorite(5));

        let (dash, _) = context.open_dashboard().unwrap();
        assert!(dash.tracker().is_favorite(5));
    }
}
