//! Static configuration file: connection parameters plus the source list.
//!
//! The format is one `key: value` pair per line, split on the first `:`.
//! `#` starts a comment. Every `file:` line adds one source mapping
//! locator, in order; every other key is a connection parameter.
//!
//! ```text
//! # destination
//! driver: postgres
//! host: localhost
//! port: 5432
//! username: ingest
//! password: secret
//! database: metrics
//!
//! file: mappings/ticker.json
//! file: mappings/weather.json
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::AppError;
use crate::models::Source;
use crate::traits::SourceProvider;

const SOURCE_KEY: &str = "file";
const REQUIRED_KEYS: [&str; 6] = ["driver", "host", "port", "username", "password", "database"];
const DEFAULT_ID_COLUMN: &str = "id";

/// Parameters needed to open the destination database.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub driver: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
    /// Column reported back as the inserted row identifier.
    pub id_column: String,
}

impl std::fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("driver", &self.driver)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***")
            .field("database", &self.database)
            .field("id_column", &self.id_column)
            .finish()
    }
}

/// Fully parsed configuration file.
#[derive(Debug, Clone, PartialEq)]
pub struct SiphonConfig {
    pub connection: ConnectionParams,
    pub sources: Vec<Source>,
}

impl SiphonConfig {
    /// Parse configuration text.
    pub fn parse(content: &str) -> Result<Self, AppError> {
        let mut params = BTreeMap::new();
        let mut sources = Vec::new();

        for line in content.lines() {
            let line = line.split('#').next().unwrap_or_default().trim();
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let (key, value) = (key.trim(), value.trim());

            if key.eq_ignore_ascii_case(SOURCE_KEY) {
                sources.push(Source::new(sources.len(), value));
            } else {
                params.insert(key.to_string(), value.to_string());
            }
        }

        let missing: Vec<&str> = REQUIRED_KEYS
            .iter()
            .copied()
            .filter(|key| !params.contains_key(*key))
            .collect();
        if !missing.is_empty() {
            return Err(AppError::ConfigInvalid(format!(
                "Missing database configs: {}",
                missing.join("; ")
            )));
        }

        let port = params["port"].parse::<u16>().map_err(|_| {
            AppError::ConfigInvalid(format!(
                "Invalid port '{}': must be an integer between 0 and 65535",
                params["port"]
            ))
        })?;

        let mut take = |key: &str| params.remove(key).unwrap_or_default();
        let connection = ConnectionParams {
            driver: take("driver"),
            host: take("host"),
            port,
            username: take("username"),
            password: take("password"),
            database: take("database"),
            id_column: Some(take("id_column"))
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| DEFAULT_ID_COLUMN.to_string()),
        };

        Ok(Self {
            connection,
            sources,
        })
    }
}

/// Configuration file on disk. Re-read on every call so that source list
/// edits take effect on the next tick.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    path: PathBuf,
}

impl ConfigFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<SiphonConfig, AppError> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            AppError::ConfigInvalid(format!(
                "Failed to read config file {}: {e}",
                self.path.display()
            ))
        })?;
        SiphonConfig::parse(&content)
    }
}

impl SourceProvider for ConfigFile {
    fn sources(&self) -> Result<Vec<Source>, AppError> {
        self.load().map(|config| config.sources)
    }
}
