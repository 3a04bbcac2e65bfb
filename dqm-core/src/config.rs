use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{DqmError, Result};

/// Run extracted from histogram exports when no override is given.
pub const DEFAULT_RUN_NUMBER: i32 = 297057;

/// Load environment variables from .env files in multiple locations
///
/// Priority order (highest to lowest):
/// 1. Current directory .env
/// 2. ~/.dqmctl/.env
/// 3. Environment variables already set
pub fn load_dotenv() -> Result<()> {
    let mut loaded_from = Vec::new();

    if let Ok(path) = dotenvy::dotenv() {
        loaded_from.push(format!("current directory ({})", path.display()));
        debug!("Loaded .env from current directory: {}", path.display());
    }

    if let Some(env_file) = config_dir().map(|dir| dir.join(".env")) {
        if env_file.exists() {
            // dotenvy never overwrites variables that are already set
            match dotenvy::from_path(&env_file) {
                Ok(_) => {
                    loaded_from.push(format!("~/.dqmctl/.env ({})", env_file.display()));
                    debug!("Loaded .env from ~/.dqmctl: {}", env_file.display());
                }
                Err(e) => {
                    debug!("Failed to load ~/.dqmctl/.env: {}", e);
                }
            }
        }
    }

    if loaded_from.is_empty() {
        debug!("No .env files found (current dir or ~/.dqmctl)");
    } else {
        info!("Loaded configuration from: {}", loaded_from.join(", "));
    }

    Ok(())
}

/// Get the dqmctl config directory path (~/.dqmctl)
pub fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".dqmctl"))
}

// ============================================================================
// TOML Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DqmConfig {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub ingest: IngestConfig,

    #[serde(default)]
    pub browse: BrowseConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Connection URL; takes precedence over environment variables
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Only rows of this run are extracted from histogram exports
    #[serde(default = "default_run_number")]
    pub run_number: i32,

    /// Size of the CSV chunks streamed to the server during COPY
    #[serde(default = "default_copy_chunk_bytes")]
    pub copy_chunk_bytes: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            run_number: default_run_number(),
            copy_chunk_bytes: default_copy_chunk_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowseConfig {
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for BrowseConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
        }
    }
}

fn default_max_connections() -> u32 {
    5
}

fn default_run_number() -> i32 {
    DEFAULT_RUN_NUMBER
}

fn default_copy_chunk_bytes() -> usize {
    1024 * 1024
}

fn default_page_size() -> u32 {
    50
}

impl DqmConfig {
    /// Load config from TOML files
    ///
    /// Priority order (highest to lowest):
    /// 1. ./dqmctl.toml (project-specific)
    /// 2. ~/.dqmctl/config.toml (user defaults)
    /// 3. Built-in defaults
    pub fn load() -> Self {
        let mut config = DqmConfig::default();

        if let Some(global_config_path) = config_dir().map(|d| d.join("config.toml")) {
            if let Some(global) = Self::read_file(&global_config_path) {
                config = global;
            }
        }

        if let Some(local) = Self::read_file(&PathBuf::from("dqmctl.toml")) {
            config = Self::merge(config, local);
        }

        config
    }

    fn read_file(path: &PathBuf) -> Option<Self> {
        if !path.exists() {
            return None;
        }
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<DqmConfig>(&contents) {
                Ok(config) => {
                    debug!("Loaded config from {}", path.display());
                    Some(config)
                }
                Err(e) => {
                    warn!("Failed to parse {}: {}", path.display(), e);
                    None
                }
            },
            Err(e) => {
                debug!("Failed to read {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Merge two configs (right overrides left)
    fn merge(mut base: Self, overlay: Self) -> Self {
        if overlay.database.url.is_some() {
            base.database.url = overlay.database.url;
        }
        base.database.max_connections = overlay.database.max_connections;
        base.ingest = overlay.ingest;
        base.browse = overlay.browse;
        base
    }
}

/// Connection target for the warehouse database
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseTarget {
    /// A full `postgres://` URL
    Url(String),
    /// Split settings shared with the web application's environment
    Parts {
        host: String,
        port: Option<u16>,
        name: String,
        user: Option<String>,
        password: Option<String>,
    },
}

impl DatabaseTarget {
    /// Resolution order: explicit URL, `DATABASE_URL`, then `DJANGO_DATABASE_*`.
    pub fn resolve(
        url: Option<&str>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let non_empty = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
            return Ok(Self::Url(url.to_string()));
        }
        if let Some(url) = non_empty("DATABASE_URL") {
            return Ok(Self::Url(url));
        }

        let name = non_empty("DJANGO_DATABASE_NAME").ok_or_else(|| {
            DqmError::config("DATABASE_URL not set and DJANGO_DATABASE_NAME missing")
        })?;
        let port = match non_empty("DJANGO_DATABASE_PORT") {
            Some(raw) => Some(raw.trim().parse::<u16>().map_err(|_| {
                DqmError::config(format!("DJANGO_DATABASE_PORT is not a port: '{}'", raw))
            })?),
            None => None,
        };

        Ok(Self::Parts {
            host: non_empty("DJANGO_DATABASE_HOST").unwrap_or_else(|| "localhost".to_string()),
            port,
            name,
            user: non_empty("DJANGO_DATABASE_USER"),
            password: non_empty("DJANGO_DATABASE_PASSWORD"),
        })
    }
}
