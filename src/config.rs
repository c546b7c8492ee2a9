//! Configuration loading
//!
//! Loads database connection configuration from environment variables,
//! optionally reading from a .env file first. Command-line values take
//! precedence over anything found in the environment.

use crate::prelude::GencrudError;
use std::{env, path::Path};
use tracing::{debug, error, trace, warn};

/// Database connection configuration
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

/// Connection values supplied explicitly (e.g. on the command line)
#[derive(Debug, Default, Clone)]
pub struct DbOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl DbConfig {
    /// Load configuration from environment variables
    ///
    /// Expected variables:
    /// - DB_HOST (default: localhost)
    /// - DB_PORT (default: 5432)
    /// - DB_NAME (required)
    /// - DB_USER (required)
    /// - DB_PASSWORD (required)
    pub fn from_env() -> Result<Self, GencrudError> {
        Self::resolve(&DbOverrides::default())
    }

    /// Read the environment, letting explicit values win over it
    ///
    /// A required variable may be missing from the environment as long as
    /// the matching override is present.
    pub fn resolve(overrides: &DbOverrides) -> Result<Self, GencrudError> {
        debug!("Loading database configuration from environment");

        let host = match &overrides.host {
            Some(host) => host.clone(),
            None => env::var("DB_HOST").unwrap_or_else(|_| {
                trace!("DB_HOST not set, using default");
                "localhost".to_string()
            }),
        };

        let port = match overrides.port {
            Some(port) => port,
            None => {
                let port_str = env::var("DB_PORT").unwrap_or_else(|_| {
                    trace!("DB_PORT not set, using default");
                    "5432".to_string()
                });
                port_str.parse::<u16>().map_err(|e| {
                    error!(port = ?port_str, error = ?e, "Invalid DB_PORT value");
                    GencrudError::Config("DB_PORT must be a valid port number".to_string())
                })?
            }
        };

        let database = required(overrides.database.as_ref(), "DB_NAME")?;
        let user = required(overrides.user.as_ref(), "DB_USER")?;
        let password = required(overrides.password.as_ref(), "DB_PASSWORD")?;

        debug!(host = ?host, port = ?port, database = ?database, user = ?user, "Configuration loaded");

        Ok(Self {
            host,
            port,
            database,
            user,
            password,
        })
    }

    /// Load a .env file and then read configuration from environment
    pub fn load(env_file: &Path, overrides: &DbOverrides) -> Result<Self, GencrudError> {
        if env_file.exists() {
            debug!(path = ?env_file, "Loading environment file");
            dotenvy::from_path(env_file).map_err(|e| {
                error!(path = ?env_file, error = ?e, "Failed to load environment file");
                GencrudError::Config(format!("Failed to load {}: {}", env_file.display(), e))
            })?;
        } else {
            warn!(path = ?env_file, "Environment file not found, using existing environment");
        }

        Self::resolve(overrides)
    }

    /// Build a PostgreSQL connection string
    pub fn postgres_connection_string(&self) -> String {
        format!(
            "host={} port={} dbname={} user={} password={}",
            self.host, self.port, self.database, self.user, self.password
        )
    }

    /// Build a connection string with password redacted (for error messages)
    pub fn redacted_connection_string(&self) -> String {
        format!(
            "host={} port={} dbname={} user={} password=***",
            self.host, self.port, self.database, self.user
        )
    }
}

fn required(explicit: Option<&String>, var: &str) -> Result<String, GencrudError> {
    if let Some(value) = explicit {
        trace!(variable = var, "Using explicit value");
        return Ok(value.clone());
    }

    env::var(var).map_err(|_| {
        error!(variable = var, "Required environment variable is not set");
        GencrudError::Config(format!("{} environment variable is required", var))
    })
}
