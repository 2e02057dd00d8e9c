use std::fs;
use std::path::{Path, PathBuf};

use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::api::client::ApiClient;
use crate::api::models::Session;
use crate::error::{ApiError, ConfigError};

pub const BACKEND_URL_ENV: &str = "PERISKON_BACKEND_URL";
pub const ANON_KEY_ENV: &str = "PERISKON_ANON_KEY";

/// Backend coordinates plus the persisted auth session.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub backend_url: String,
    #[serde(default)]
    pub anon_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<Session>,
}

impl Config {
    pub fn path() -> Option<PathBuf> {
        let base = BaseDirs::new()?;
        Some(base.config_dir().join("periskon.toml"))
    }

    /// Reads the config file, then lets the environment override the backend coordinates.
    /// A missing or unreadable file yields an empty config.
    pub fn load() -> Self {
        let from_file = match Self::path() {
            Some(path) if path.exists() => Self::load_from(&path).unwrap_or_else(|e| {
                log::warn!("ignoring unreadable config {}: {}", path.display(), e);
                Self::default()
            }),
            _ => Self::default(),
        };
        from_file.with_overrides(
            std::env::var(BACKEND_URL_ENV).ok(),
            std::env::var(ANON_KEY_ENV).ok(),
        )
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    pub fn with_overrides(mut self, backend_url: Option<String>, anon_key: Option<String>) -> Self {
        if let Some(url) = backend_url.filter(|u| !u.trim().is_empty()) {
            self.backend_url = crate::utils::normalize_url(&url);
        }
        if let Some(key) = anon_key.filter(|k| !k.trim().is_empty()) {
            self.anon_key = key.trim().to_string();
        }
        self
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::path().ok_or(ConfigError::NoConfigDir)?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let toml = toml::to_string_pretty(self)?;
        fs::write(path, toml)?;
        Ok(())
    }

    pub fn is_configured(&self) -> bool {
        !self.backend_url.trim().is_empty() && !self.anon_key.trim().is_empty()
    }

    pub fn api_client(&self) -> Result<ApiClient, ApiError> {
        ApiClient::new(&self.backend_url, &self.anon_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::SessionUser;

    #[test]
    fn round_trips_with_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("periskon.toml");
        let cfg = Config {
            backend_url: "https://abc.example.co".into(),
            anon_key: "anon".into(),
            session: Some(Session {
                access_token: "a".into(),
                refresh_token: "r".into(),
                expires_at: 1_700_000_000,
                user: SessionUser { id: "u1".into(), email: Some("a@b.co".into()) },
            }),
        };
        cfg.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), cfg);
    }

    #[test]
    fn missing_fields_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("periskon.toml");
        fs::write(&path, "backend_url = \"https://x.co\"\n").unwrap();
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg.backend_url, "https://x.co");
        assert!(cfg.session.is_none());
        assert!(!cfg.is_configured());
    }

    #[test]
    fn overrides_replace_file_values() {
        let cfg = Config { backend_url: "https://old.co".into(), anon_key: "old".into(), session: None }
            .with_overrides(Some("new.co".into()), Some(" ".into()));
        assert_eq!(cfg.backend_url, "https://new.co");
        assert_eq!(cfg.anon_key, "old");
        assert!(cfg.is_configured());
    }
}
