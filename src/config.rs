use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Server settings, read from a TOML file. Missing keys fall back to the defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    /// Directory for daily-rotated log files, stdout when unset
    pub log_dir: Option<PathBuf>,
    /// Sessions expire after this many days of inactivity
    pub session_ttl_days: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite://database/course.db".to_string(),
            host: "127.0.0.1".to_string(),
            port: 8080,
            log_dir: None,
            session_ttl_days: 5,
        }
    }
}

impl Config {
    /// Load from `path` if given, then let `DATABASE_URL` from the environment
    /// (or a `.env` file) override the database location.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)?;
                toml::from_str::<Config>(&content)?
            }
            None => Config::default(),
        };
        let _ = dotenvy::dotenv();
        if let Ok(url) = dotenvy::var("DATABASE_URL") {
            config.database_url = url;
        }
        Ok(config)
    }
}
