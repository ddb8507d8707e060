use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Result, anyhow};

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";
pub const DEFAULT_WELCOME: &str =
    "Hello! I can answer questions about your library data, analyze images, and load CSV files.";
pub const URL_ENV_VAR: &str = "CHATDESK_URL";

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub welcome_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    pub fn save_base_url(url: &str) -> Result<()> {
        let mut config = Self::load().unwrap_or_else(|_| Self::new());
        config.base_url = Some(url.to_string());
        config.save()
    }

    /// Backend URL: explicit override, then `CHATDESK_URL`, then the file,
    /// then the local default.
    pub fn resolve_base_url(&self, cli_override: Option<&str>) -> String {
        self.resolve_base_url_with(cli_override, std::env::var(URL_ENV_VAR).ok())
    }

    fn resolve_base_url_with(&self, cli_override: Option<&str>, env_url: Option<String>) -> String {
        cli_override
            .map(str::to_string)
            .or_else(|| env_url.filter(|u| !u.is_empty()))
            .or_else(|| self.base_url.clone())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }

    pub fn welcome(&self) -> &str {
        self.welcome_message.as_deref().unwrap_or(DEFAULT_WELCOME)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn get_config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("chatdesk"))
    }

    fn get_config_path() -> Result<PathBuf> {
        Ok(Self::get_config_dir()?.join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::new());
        assert_eq!(config.welcome(), DEFAULT_WELCOME);
        assert_eq!(config.request_timeout(), None);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            base_url: Some("http://library.local:8080".to_string()),
            welcome_message: Some("Welcome back!".to_string()),
            request_timeout_secs: Some(30),
        };

        config.save_to(&path).unwrap();
        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.request_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_partial_file_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"welcome_message": "Hi"}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.welcome(), "Hi");
        assert_eq!(config.base_url, None);
    }

    #[test]
    fn test_cli_override_wins() {
        let config = Config {
            base_url: Some("http://from-file".to_string()),
            ..Config::default()
        };
        assert_eq!(
            config.resolve_base_url(Some("http://from-cli")),
            "http://from-cli"
        );
    }

    #[test]
    fn test_url_precedence() {
        let file = Config {
            base_url: Some("http://from-file".to_string()),
            ..Config::default()
        };
        let env = || Some("http://from-env".to_string());

        assert_eq!(
            file.resolve_base_url_with(Some("http://from-cli"), env()),
            "http://from-cli"
        );
        assert_eq!(file.resolve_base_url_with(None, env()), "http://from-env");
        assert_eq!(
            file.resolve_base_url_with(None, Some(String::new())),
            "http://from-file"
        );
        assert_eq!(file.resolve_base_url_with(None, None), "http://from-file");
        assert_eq!(
            Config::new().resolve_base_url_with(None, None),
            DEFAULT_BASE_URL
        );
    }
}
