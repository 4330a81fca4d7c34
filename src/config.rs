//! Client Configuration
//!
//! `<data_dir>/client_config.json`, then `ITASKORG_SERVER` / `ITASKORG_USER`,
//! then command-line flags.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};

pub const CONFIG_FILE: &str = "client_config.json";
pub const DEFAULT_DATA_DIR: &str = ".itaskorg";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientConfig {
    pub server_url: String,
    pub user_id: Option<String>,
    #[serde(skip)]
    pub data_dir: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8787".to_string(),
            user_id: None,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
        }
    }
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub data_dir: Option<PathBuf>,
    pub server_url: Option<String>,
    pub user_id: Option<String>,
}

impl ClientConfig {
    /// Read the config file in `data_dir`; a missing file gives defaults
    pub fn load(data_dir: &Path) -> ClientResult<Self> {
        let path = data_dir.join(CONFIG_FILE);
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            serde_json::from_str::<Self>(&raw)
                .map_err(|e| ClientError::Config(format!("{}: {}", path.display(), e)))?
        } else {
            Self::default()
        };
        config.data_dir = data_dir.to_path_buf();
        Ok(config)
    }

    pub fn save(&self) -> ClientResult<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(self.data_dir.join(CONFIG_FILE), raw)?;
        Ok(())
    }

    pub fn resolve(overrides: &Overrides) -> ClientResult<Self> {
        Self::resolve_with(overrides, |name| std::env::var(name).ok())
    }

    pub fn resolve_with<F>(overrides: &Overrides, lookup: F) -> ClientResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir = overrides
            .data_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
        let mut config = Self::load(&data_dir)?;

        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if let Some(url) = get("ITASKORG_SERVER") {
            config.server_url = url;
        }
        if let Some(user) = get("ITASKORG_USER") {
            config.user_id = Some(user);
        }
        if let Some(url) = &overrides.server_url {
            config.server_url = url.clone();
        }
        if let Some(user) = &overrides.user_id {
            config.user_id = Some(user.clone());
        }

        config.server_url = config.server_url.trim_end_matches('/').to_string();
        if !config.server_url.starts_with("http://") && !config.server_url.starts_with("https://") {
            return Err(ClientError::Config(format!("server url must be http(s): {}", config.server_url)));
        }
        Ok(config)
    }

    pub fn require_user(&self) -> ClientResult<&str> {
        self.user_id
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| ClientError::Config("no user id; pass --user or set ITASKORG_USER".to_string()))
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join("store.json")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_nothing_configured() {
        let dir = tempfile::tempdir().unwrap();
        let overrides = Overrides { data_dir: Some(dir.path().to_path_buf()), ..Default::default() };

        let config = ClientConfig::resolve_with(&overrides, |_| None).unwrap();
        assert_eq!(config.server_url, "http://127.0.0.1:8787");
        assert!(config.require_user().is_err());
    }

    #[test]
    fn test_file_then_env_then_flags() {
        let dir = tempfile::tempdir().unwrap();
        let saved = ClientConfig {
            server_url: "http://file:1".into(),
            user_id: Some("from-file".into()),
            data_dir: dir.path().to_path_buf(),
        };
        saved.save().unwrap();

        let overrides = Overrides { data_dir: Some(dir.path().to_path_buf()), ..Default::default() };
        let env = |name: &str| (name == "ITASKORG_SERVER").then(|| "http://env:2/".to_string());
        let config = ClientConfig::resolve_with(&overrides, env).unwrap();
        assert_eq!(config.server_url, "http://env:2");
        assert_eq!(config.require_user().unwrap(), "from-file");

        let overrides = Overrides { user_id: Some("flag".into()), ..overrides };
        let config = ClientConfig::resolve_with(&overrides, env).unwrap();
        assert_eq!(config.require_user().unwrap(), "flag");
    }

    #[test]
    fn test_rejects_non_http_server() {
        let dir = tempfile::tempdir().unwrap();
        let overrides = Overrides {
            data_dir: Some(dir.path().to_path_buf()),
            server_url: Some("ftp://nope".into()),
            ..Default::default()
        };
        assert!(matches!(ClientConfig::resolve_with(&overrides, |_| None), Err(ClientError::Config(_))));
    }
}
