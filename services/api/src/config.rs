//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// Directory holding the registry, corpus, and last-batch files.
    pub data_dir: PathBuf,
    /// The nested questionnaire definition consumed at startup.
    pub catalog_path: PathBuf,
    pub log_level: Level,
    pub frontend_origin: String,
    pub master_code: String,
    pub code_prefix: String,
    pub batch_size: usize,
    /// Scale whose elevated profile raises the validity alert.
    pub alert_scale: String,
    pub admin_user: String,
    /// PHC-format argon2 hash of the operator password.
    pub admin_password_hash: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let frontend_origin = std::env::var("FRONTEND_ORIGIN")
            .unwrap_or_else(|_| "http://localhost:3000".to_string());

        // --- Load Storage Locations ---
        let data_dir = std::env::var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"));
        let catalog_path = std::env::var("CATALOG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data.json"));

        // --- Load Questionnaire Settings ---
        let master_code =
            std::env::var("MASTER_CODE").unwrap_or_else(|_| "GO2B-MASTER".to_string());
        let code_prefix = std::env::var("CODE_PREFIX").unwrap_or_else(|_| "GO2B".to_string());
        let batch_size_str = std::env::var("BATCH_SIZE").unwrap_or_else(|_| "50".to_string());
        let batch_size = batch_size_str.parse::<usize>().map_err(|e| {
            ConfigError::InvalidValue("BATCH_SIZE".to_string(), e.to_string())
        })?;
        let alert_scale = std::env::var("ALERT_SCALE")
            .unwrap_or_else(|_| assessment_core::scoring::SOCIAL_DESIRABILITY_SCALE.to_string());

        // --- Load Operator Credentials ---
        let admin_user = std::env::var("ADMIN_USER")
            .map_err(|_| ConfigError::MissingVar("ADMIN_USER".to_string()))?;
        let admin_password_hash = std::env::var("ADMIN_PASSWORD_HASH")
            .map_err(|_| ConfigError::MissingVar("ADMIN_PASSWORD_HASH".to_string()))?;

        Ok(Self {
            bind_address,
            data_dir,
            catalog_path,
            log_level,
            frontend_origin,
            master_code,
            code_prefix,
            batch_size,
            alert_scale,
            admin_user,
            admin_password_hash,
        })
    }
}
