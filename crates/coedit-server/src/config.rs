//! Server configuration.

use anyhow::{bail, Result};
use std::path::PathBuf;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the TCP listener binds to
    pub listen_addr: String,

    /// Persistence configuration
    pub persistence: PersistenceConfig,
}

/// Persistence configuration.
#[derive(Debug, Clone)]
pub struct PersistenceConfig {
    /// Persistence type: "sqlite" or "memory"
    pub store_type: String,

    /// Database path (for SQLite)
    pub db_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:9090".to_string(),
            persistence: PersistenceConfig {
                store_type: "sqlite".to_string(),
                db_path: PathBuf::from("./coedit.db"),
            },
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `COEDIT_LISTEN_ADDR`: listen address (default `127.0.0.1:9090`)
    /// - `COEDIT_STORE`: "sqlite" or "memory"
    /// - `COEDIT_DB_PATH`: SQLite database path
    ///
    /// # Errors
    ///
    /// Returns error if `COEDIT_STORE` names an unknown store type.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("COEDIT_LISTEN_ADDR") {
            config.listen_addr = addr;
        }

        if let Ok(store) = std::env::var("COEDIT_STORE") {
            config.persistence.store_type = store;
        }

        if let Ok(db_path) = std::env::var("COEDIT_DB_PATH") {
            config.persistence.db_path = PathBuf::from(db_path);
        }

        if !matches!(
            config.persistence.store_type.as_str(),
            "sqlite" | "memory"
        ) {
            bail!(
                "COEDIT_STORE must be 'sqlite' or 'memory', got '{}'",
                config.persistence.store_type
            );
        }

        Ok(config)
    }
}
