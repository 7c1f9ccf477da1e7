//! Engine configuration.
//!
//! Configuration is loaded from environment variables or built in code via
//! [`Default`].
//!
//! # Environment Variables
//!
//! - `TREEFILE_DATABASE_PATH`: Database file used by the CLI (default: `./treefile.db`)
//! - `TREEFILE_PAGE_SIZE`: Page size for newly created files (default: `1024`)
//! - `TREEFILE_BUFFER_POOL_CAPACITY`: Maximum page buffers leased at once (default: `4096`)
//!
//! # Invariants
//!
//! - `page_size` is always within `MIN_PAGE_SIZE..=MAX_PAGE_SIZE`
//! - `buffer_pool_capacity` is always positive

use std::path::PathBuf;

use crate::storage::{DEFAULT_PAGE_SIZE, DEFAULT_POOL_CAPACITY, MAX_PAGE_SIZE, MIN_PAGE_SIZE};

const DATABASE_PATH_VAR: &str = "TREEFILE_DATABASE_PATH";
const PAGE_SIZE_VAR: &str = "TREEFILE_PAGE_SIZE";
const BUFFER_POOL_CAPACITY_VAR: &str = "TREEFILE_BUFFER_POOL_CAPACITY";

/// Engine configuration.
///
/// The page size only applies when a file is created; an existing file keeps
/// the page size recorded in its header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Database file opened by the CLI.
    pub database_path: PathBuf,
    /// Page size for newly created files.
    pub page_size: usize,
    /// Maximum number of page buffers leased at once.
    pub buffer_pool_capacity: usize,
}

/// Error returned when loading configuration fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    InvalidValue { name: String, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { name, message } => {
                write!(f, "invalid value for {name}: {message}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(Self::DEFAULT_DATABASE_PATH),
            page_size: DEFAULT_PAGE_SIZE,
            buffer_pool_capacity: DEFAULT_POOL_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Default database file.
    pub const DEFAULT_DATABASE_PATH: &'static str = "./treefile.db";

    /// Load configuration from environment variables.
    ///
    /// Unset variables take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `TREEFILE_DATABASE_PATH` is set but empty
    /// - `TREEFILE_PAGE_SIZE` is set but not a number within the accepted range
    /// - `TREEFILE_BUFFER_POOL_CAPACITY` is set but not a positive number
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_path = match lookup(DATABASE_PATH_VAR) {
            Some(value) if value.is_empty() => {
                return Err(ConfigError::InvalidValue {
                    name: DATABASE_PATH_VAR.to_string(),
                    message: "must not be empty".to_string(),
                });
            }
            Some(value) => PathBuf::from(value),
            None => PathBuf::from(Self::DEFAULT_DATABASE_PATH),
        };
        let page_size = lookup(PAGE_SIZE_VAR)
            .map_or(Ok(DEFAULT_PAGE_SIZE), |value| Self::parse_page_size(&value))?;
        let buffer_pool_capacity = lookup(BUFFER_POOL_CAPACITY_VAR).map_or(
            Ok(DEFAULT_POOL_CAPACITY),
            |value| Self::parse_buffer_pool_capacity(&value),
        )?;

        Ok(Self {
            database_path,
            page_size,
            buffer_pool_capacity,
        })
    }

    fn parse_page_size(value: &str) -> Result<usize, ConfigError> {
        let invalid = || ConfigError::InvalidValue {
            name: PAGE_SIZE_VAR.to_string(),
            message: format!(
                "'{value}' is not a valid page size (must be {MIN_PAGE_SIZE}-{MAX_PAGE_SIZE})"
            ),
        };

        let page_size = value.trim().parse::<usize>().map_err(|_| invalid())?;
        if (MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&page_size) {
            Ok(page_size)
        } else {
            Err(invalid())
        }
    }

    fn parse_buffer_pool_capacity(value: &str) -> Result<usize, ConfigError> {
        match value.trim().parse::<usize>() {
            Ok(capacity) if capacity > 0 => Ok(capacity),
            _ => Err(ConfigError::InvalidValue {
                name: BUFFER_POOL_CAPACITY_VAR.to_string(),
                message: format!("'{value}' is not a positive number"),
            }),
        }
    }
}
