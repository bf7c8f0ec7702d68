use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::auth::Token;
use crate::monitor::{Credentials, WatchSettings};
use crate::notify::NotificationSettings;

/// Configuration file structure for ciwatch.
///
/// Loaded from the working directory or the user config directory; every key
/// has a default so a partial file is fine.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// GitLab instance and credentials
    #[serde(default)]
    pub gitlab: GitLabConfig,

    /// Polling and notification behavior
    #[serde(default)]
    pub watch: WatchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GitLabConfig {
    /// GitLab personal access token
    pub token: Option<String>,

    /// GitLab instance base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct WatchConfig {
    /// Seconds between poll cycles (clamped to a 10s minimum at runtime)
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,

    /// Notify when a pipeline passes
    #[serde(default = "default_true")]
    pub notify_on_success: bool,

    /// Notify when a pipeline fails
    #[serde(default = "default_true")]
    pub notify_on_failure: bool,
}

impl Default for GitLabConfig {
    fn default() -> Self {
        Self {
            token: None,
            base_url: default_base_url(),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval_seconds(),
            notify_on_success: true,
            notify_on_failure: true,
        }
    }
}

fn default_base_url() -> String {
    "https://gitlab.com".to_string()
}

fn default_interval_seconds() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches in this order:
    /// 1. Specified path
    /// 2. ./ciwatch.toml, ./ciwatch.json, ./ciwatch.yaml, ./ciwatch.yml
    /// 3. <user config dir>/ciwatch/config.toml
    ///
    /// Returns default configuration if no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_path(path);
        }

        let candidates = ["ciwatch.toml", "ciwatch.json", "ciwatch.yaml", "ciwatch.yml"];
        for candidate in &candidates {
            let path = Path::new(candidate);
            if path.exists() {
                return Self::load_from_path(path);
            }
        }

        if let Some(path) = Self::user_config_path() {
            if path.exists() {
                return Self::load_from_path(&path);
            }
        }

        Ok(Self::default())
    }

    fn user_config_path() -> Option<PathBuf> {
        Some(dirs::config_dir()?.join("ciwatch").join("config.toml"))
    }

    /// Load configuration from a specific file path.
    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display())),
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
            _ => toml::from_str(&contents)
                .or_else(|_| serde_json::from_str(&contents))
                .or_else(|_| serde_yaml::from_str(&contents))
                .with_context(|| format!("Failed to parse config file: {}", path.display())),
        }
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::to_string_pretty(self)?,
            Some("yaml") | Some("yml") => serde_yaml::to_string(self)?,
            _ => toml::to_string_pretty(self)?,
        };

        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// The monitor settings this configuration describes. Credentials are
    /// only present once a token is configured.
    pub fn watch_settings(&self) -> WatchSettings {
        WatchSettings {
            credentials: self.gitlab.token.as_ref().map(|token| Credentials {
                base_url: self.gitlab.base_url.clone(),
                token: Token::from(token.as_str()),
            }),
            interval_secs: self.watch.interval_seconds,
            notifications: NotificationSettings {
                on_success: self.watch.notify_on_success,
                on_failure: self.watch.notify_on_failure,
            },
        }
    }
}
