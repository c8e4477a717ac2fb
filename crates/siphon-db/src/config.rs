use siphon_core::{AppError, ConnectionParams};

const POSTGRES_DRIVERS: [&str; 3] = ["postgres", "postgresql", "pgsql"];

/// Configuration for the database connection pool.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub params: ConnectionParams,
    pub max_connections: u32,
}

impl DatabaseConfig {
    /// Validate connection parameters from the config file.
    ///
    /// Only PostgreSQL drivers are supported; `max_connections` must be at
    /// least 1.
    pub fn from_params(params: ConnectionParams, max_connections: u32) -> Result<Self, AppError> {
        let driver = params.driver.to_lowercase();
        if !POSTGRES_DRIVERS.contains(&driver.as_str()) {
            return Err(AppError::ConfigInvalid(format!(
                "Unsupported database driver '{}': expected one of {}",
                params.driver,
                POSTGRES_DRIVERS.join(", ")
            )));
        }

        if params.host.is_empty() || params.database.is_empty() {
            return Err(AppError::ConfigInvalid(
                "Database host and name must not be empty".into(),
            ));
        }

        if max_connections == 0 {
            return Err(AppError::ConfigInvalid(
                "DATABASE_MAX_CONNECTIONS must be at least 1".into(),
            ));
        }

        Ok(Self {
            params,
            max_connections,
        })
    }
}
