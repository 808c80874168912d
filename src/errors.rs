use std::path::PathBuf;
use thiserror::Error;

/// Application-wide error type - single point of truth
#[derive(Error, Debug)]
pub enum AppError {
    /// Connection configuration could not be resolved
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Tool settings (mysql-helper.toml / environment) could not be loaded
    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),

    /// Driver-level failures outside a connection scope
    #[error("Database error: {0}")]
    Driver(#[from] DriverError),

    /// Data validation/parsing
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Work run inside a connection scope failed and was rolled back
    #[error("Rolled back: {0}")]
    RolledBack(String),
}

/// Errors raised while resolving a connection configuration.
///
/// These are always raised before any connection attempt, so there is
/// never anything to roll back.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("No configuration provided")]
    NoSource,

    #[error("A config source and discrete connection parameters are mutually exclusive")]
    Ambiguous,

    #[error("Missing required connection parameter: {0}")]
    MissingField(&'static str),

    #[error("Error loading JSON config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error loading JSON config: {0}")]
    Json(#[source] serde_json::Error),

    #[error("Config must be a JSON object, found {0}")]
    NotAnObject(&'static str),

    #[error("Invalid connection config: {0}")]
    InvalidMapping(#[source] serde_json::Error),

    #[error("Failed to read password: {0}")]
    Prompt(#[source] std::io::Error),
}

/// Errors reported by a database driver backend.
#[derive(Error, Debug)]
pub enum DriverError {
    /// SQLite backend
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// MySQL backend
    #[cfg(feature = "mysql")]
    #[error("MySQL error: {0}")]
    MySql(#[from] mysql::Error),

    /// Any other driver implementation
    #[error("Driver error: {0}")]
    Backend(Box<dyn std::error::Error + Send + Sync>),

    #[error("Unsupported parameter at position {index}: {reason}")]
    UnsupportedParameter { index: usize, reason: String },

    /// A fetch was issued but the last statement produced no result set
    #[error("No result set available: the last statement returned no rows")]
    NoResultSet,
}

/// Failure of a single connection scope.
///
/// `Callback` carries the callback's own error untouched, so callers can
/// recover the original value with [`ScopeError::into_callback`].
#[derive(Error, Debug)]
pub enum ScopeError<E> {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Connection failed: {0}")]
    Connect(#[source] DriverError),

    #[error("Failed to open cursor: {0}")]
    Cursor(#[source] DriverError),

    #[error("Commit failed: {0}")]
    Commit(#[source] DriverError),

    #[error("Failed to close session: {0}")]
    Close(#[source] DriverError),

    #[error("{0}")]
    Callback(E),
}

impl<E> ScopeError<E> {
    /// The callback's original error, if that is what ended the scope
    pub fn into_callback(self) -> Option<E> {
        match self {
            ScopeError::Callback(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_config(&self) -> bool {
        matches!(self, ScopeError::Config(_))
    }
}

/// Application-wide result type - single point of truth
pub type AppResult<T> = Result<T, AppError>;

/// Result type for driver operations
pub type DriverResult<T> = Result<T, DriverError>;

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidData(format!("JSON error: {}", err))
    }
}

impl<E: std::fmt::Display> From<ScopeError<E>> for AppError {
    fn from(err: ScopeError<E>) -> Self {
        match err {
            ScopeError::Config(e) => AppError::Config(e),
            ScopeError::Connect(e)
            | ScopeError::Cursor(e)
            | ScopeError::Commit(e)
            | ScopeError::Close(e) => AppError::Driver(e),
            ScopeError::Callback(e) => AppError::RolledBack(e.to_string()),
        }
    }
}
