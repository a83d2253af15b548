//! TOML-based configuration for catdb.
//!
//! Supports a config file (catdb.toml) with environment variable expansion.
//!
//! Example configuration:
//! ```toml
//! [connections.default]
//! driver = "postgres"
//! connection_string = "host=localhost user=cat password=${PGPASSWORD} dbname=shop"
//! schema = "public"
//!
//! [connections.fixtures]
//! driver = "sqlite"
//! connection_string = "./data/shop.db"
//!
//! [planner]
//! max_path_length = 6
//!
//! [informativity]
//! scratch_table = "matches"
//! candidate_limit = 8
//! include_primary_keys = false
//!
//! [cache]
//! enabled = true
//! path = "~/.catdb/cache.db"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use super::connection::{ConnectionConfig, ConnectionError, Driver};
use crate::graph::DEFAULT_MAX_PATH_LENGTH;

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Connection not found: {0}")]
    ConnectionNotFound(String),

    #[error("Unsupported driver: {0}")]
    UnsupportedDriver(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<ConnectionError> for SettingsError {
    fn from(err: ConnectionError) -> Self {
        match err {
            ConnectionError::MissingEnvVar(var) => SettingsError::MissingEnvVar(var),
            ConnectionError::UnsupportedDriver(driver) => SettingsError::UnsupportedDriver(driver),
        }
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Named database connections.
    pub connections: HashMap<String, ConnectionSettings>,

    pub planner: PlannerSettings,

    pub informativity: InformativitySettings,

    pub cache: CacheSettings,
}

/// Connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConnectionSettings {
    /// Database driver (postgres, sqlite).
    pub driver: String,

    /// Connection string (supports ${ENV_VAR} expansion).
    pub connection_string: String,

    /// Search path for unqualified table names.
    #[serde(default)]
    pub schema: Option<String>,
}

impl ConnectionSettings {
    /// Get the driver type.
    pub fn driver_type(&self) -> Result<Driver, SettingsError> {
        Driver::from_str(&self.driver)
            .map_err(|_| SettingsError::UnsupportedDriver(self.driver.clone()))
    }

    /// Get the connection string with environment variables expanded.
    pub fn resolved_connection_string(&self) -> Result<String, SettingsError> {
        expand_env_vars(&self.connection_string)
    }
}

/// Join planning settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PlannerSettings {
    /// Most tables in an enumerated join path.
    pub max_path_length: usize,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            max_path_length: DEFAULT_MAX_PATH_LENGTH,
        }
    }
}

/// Slot selection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InformativitySettings {
    /// Table the current result set is materialized into.
    pub scratch_table: String,

    /// Most join candidates probed per join-table decision.
    pub candidate_limit: Option<usize>,

    /// Profile primary-key columns in the baseline.
    pub include_primary_keys: bool,
}

impl Default for InformativitySettings {
    fn default() -> Self {
        Self {
            scratch_table: "matches".to_string(),
            candidate_limit: Some(8),
            include_primary_keys: false,
        }
    }
}

/// Baseline cache settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheSettings {
    pub enabled: bool,

    /// Cache database file; `~` expands to the home directory.
    pub path: Option<String>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
        }
    }
}

impl CacheSettings {
    /// The configured cache file, with `~` and environment variables
    /// expanded. `None` means the default location.
    pub fn resolved_path(&self) -> Result<Option<PathBuf>, SettingsError> {
        let Some(path) = &self.path else {
            return Ok(None);
        };
        let expanded = expand_env_vars(path)?;
        match expanded.strip_prefix("~/") {
            Some(rest) => {
                let home = dirs::home_dir().ok_or_else(|| {
                    SettingsError::InvalidConfig("cannot resolve home directory".into())
                })?;
                Ok(Some(home.join(rest)))
            }
            None => Ok(Some(PathBuf::from(expanded))),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `CATDB_CONFIG`
    /// 2. `./catdb.toml`
    /// 3. `~/.config/catdb/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("CATDB_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("catdb.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("catdb").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if self.planner.max_path_length < 2 {
            return Err(SettingsError::InvalidConfig(
                "planner.max_path_length must be at least 2".into(),
            ));
        }
        if self.informativity.scratch_table.is_empty() {
            return Err(SettingsError::InvalidConfig(
                "informativity.scratch_table must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Get a connection by name.
    pub fn get_connection(&self, name: &str) -> Result<&ConnectionSettings, SettingsError> {
        self.connections
            .get(name)
            .ok_or_else(|| SettingsError::ConnectionNotFound(name.to_string()))
    }

    /// Get the default connection ("default" if it exists, otherwise the
    /// first one defined).
    pub fn default_connection(&self) -> Option<(&str, &ConnectionSettings)> {
        if let Some(conn) = self.connections.get("default") {
            return Some(("default", conn));
        }
        self.connections.iter().next().map(|(k, v)| (k.as_str(), v))
    }

    /// Pick the connection to open: the named one, else the default one,
    /// else the `CATDB_DB_*` environment variables.
    pub fn resolve_connection(
        &self,
        name: Option<&str>,
    ) -> Result<ConnectionSettings, SettingsError> {
        if let Some(name) = name {
            return self.get_connection(name).cloned();
        }
        if let Some((_, conn)) = self.default_connection() {
            return Ok(conn.clone());
        }
        let config = ConnectionConfig::from_env()?;
        tracing::debug!(driver = config.driver.as_str(), "using connection from environment");
        Ok(config.to_settings())
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let var_name: String = if chars.next_if_eq(&'{').is_some() {
            let name = chars.by_ref().take_while(|&ch| ch != '}').collect();
            name
        } else {
            let mut name = String::new();
            while let Some(ch) = chars.next_if(|ch| ch.is_alphanumeric() || *ch == '_') {
                name.push(ch);
            }
            if name.is_empty() {
                // Just a lone $, keep it
                result.push('$');
                continue;
            }
            name
        };

        let value =
            env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}
