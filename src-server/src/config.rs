//! Server Configuration
//!
//! Layered: built-in defaults, then an optional JSON file, then
//! `ITASKORG_*` environment variables, then command-line flags.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Parser, Debug, Default, Clone)]
#[command(name = "itaskorg-server")]
#[command(about = "iTaskOrg API server")]
pub struct Cli {
    /// JSON config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Address to listen on, e.g. 127.0.0.1:8787
    #[arg(long)]
    pub bind: Option<String>,

    /// SQLite database file (":memory:" for a throwaway database)
    #[arg(long)]
    pub db_path: Option<PathBuf>,

    /// Directory for rolling log files
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerConfig {
    pub bind: String,
    pub db_path: PathBuf,
    pub log_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8787".to_string(),
            db_path: PathBuf::from("data/itaskorg.db"),
            log_dir: PathBuf::from("logs"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid bind address '{0}'")]
    Bind(String),
}

impl ServerConfig {
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Override from environment-style lookups. Blank values are ignored.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if let Some(bind) = get("ITASKORG_BIND") {
            self.bind = bind;
        }
        if let Some(db_path) = get("ITASKORG_DB_PATH") {
            self.db_path = PathBuf::from(db_path);
        }
        if let Some(log_dir) = get("ITASKORG_LOG_DIR") {
            self.log_dir = PathBuf::from(log_dir);
        }
    }

    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(bind) = &cli.bind {
            self.bind = bind.clone();
        }
        if let Some(db_path) = &cli.db_path {
            self.db_path = db_path.clone();
        }
        if let Some(log_dir) = &cli.log_dir {
            self.log_dir = log_dir.clone();
        }
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind.parse().map_err(|_| ConfigError::Bind(self.bind.clone()))
    }

    /// Resolve the effective configuration for a parsed command line
    pub fn resolve(cli: &Cli) -> Result<Self, ConfigError> {
        Self::resolve_with(cli, |name| std::env::var(name).ok())
    }

    pub fn resolve_with<F>(cli: &Cli, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match &cli.config {
            Some(path) => Self::load_file(path)?,
            None => Self::default(),
        };
        config.apply_env_from(lookup);
        config.apply_cli(cli);
        config.bind_addr()?;
        Ok(config)
    }
}
