//! Database connection configuration.
//!
//! Supports configuration via environment variables:
//! - `CATDB_DB_DRIVER`: Database driver (postgres, sqlite)
//! - `CATDB_DB_HOST`: Database server hostname, or file path for SQLite
//! - `CATDB_DB_NAME`: Database name
//! - `CATDB_DB_PORT`: Port (optional, uses driver default)

use std::env;

use super::settings::ConnectionSettings;

/// Error type for connection configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Unsupported driver: {0}. Supported: postgres, sqlite")]
    UnsupportedDriver(String),
}

/// Supported database drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Driver {
    /// PostgreSQL
    Postgres,
    /// SQLite (file or in-memory)
    Sqlite,
}

impl Driver {
    /// Parse driver from string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, ConnectionError> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Driver::Postgres),
            "sqlite" | "sqlite3" => Ok(Driver::Sqlite),
            other => Err(ConnectionError::UnsupportedDriver(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Driver::Postgres => "postgres",
            Driver::Sqlite => "sqlite",
        }
    }

    /// Get the default port for this driver.
    pub fn default_port(&self) -> u16 {
        match self {
            Driver::Postgres => 5432,
            Driver::Sqlite => 0, // Not applicable
        }
    }
}

/// Database connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub driver: Driver,
    /// Server hostname, or the database file for SQLite.
    pub host: String,
    pub database: String,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Search path for unqualified table names (PostgreSQL).
    pub schema: Option<String>,
}

impl ConnectionConfig {
    pub fn postgres(host: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            driver: Driver::Postgres,
            host: host.into(),
            database: database.into(),
            port: None,
            username: None,
            password: None,
            schema: None,
        }
    }

    pub fn sqlite(path: impl Into<String>) -> Self {
        Self {
            driver: Driver::Sqlite,
            host: path.into(),
            database: String::new(),
            port: None,
            username: None,
            password: None,
            schema: None,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `CATDB_DB_DRIVER`: postgres or sqlite
    /// - `CATDB_DB_HOST`: Server hostname (or file path for SQLite)
    /// - `CATDB_DB_NAME`: Database name (not required for SQLite)
    ///
    /// Optional: `CATDB_DB_PORT`, `CATDB_DB_USER`, `CATDB_DB_PASSWORD`,
    /// `CATDB_DB_SCHEMA`.
    pub fn from_env() -> Result<Self, ConnectionError> {
        let driver_str = required("CATDB_DB_DRIVER")?;
        let driver = Driver::from_str(&driver_str)?;
        let host = required("CATDB_DB_HOST")?;

        let database = match driver {
            Driver::Postgres => required("CATDB_DB_NAME")?,
            Driver::Sqlite => env::var("CATDB_DB_NAME").unwrap_or_default(),
        };

        Ok(Self {
            driver,
            host,
            database,
            port: env::var("CATDB_DB_PORT").ok().and_then(|p| p.parse().ok()),
            username: env::var("CATDB_DB_USER").ok(),
            password: env::var("CATDB_DB_PASSWORD").ok(),
            schema: env::var("CATDB_DB_SCHEMA").ok(),
        })
    }

    /// Build the driver's connection string: libpq key/value pairs for
    /// PostgreSQL, the file path for SQLite.
    pub fn to_connection_string(&self) -> String {
        match self.driver {
            Driver::Postgres => {
                let mut parts = vec![
                    format!("host={}", self.host),
                    format!("port={}", self.port.unwrap_or(self.driver.default_port())),
                    format!("dbname={}", self.database),
                ];
                if let Some(user) = &self.username {
                    parts.push(format!("user={}", user));
                }
                if let Some(password) = &self.password {
                    parts.push(format!("password={}", password));
                }
                parts.join(" ")
            }
            Driver::Sqlite => self.host.clone(),
        }
    }

    pub fn to_settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            driver: self.driver.as_str().to_string(),
            connection_string: self.to_connection_string(),
            schema: self.schema.clone(),
        }
    }
}

fn required(var: &str) -> Result<String, ConnectionError> {
    env::var(var).map_err(|_| ConnectionError::MissingEnvVar(var.to_string()))
}
