//! Scoped database connections
//!
//! Connect, hand the work a cursor, commit on success, roll back on failure,
//! and always close the cursor and the connection.

pub mod cli;
pub mod config;
pub mod driver;
pub mod errors;
pub mod prompt;
pub mod scope;
pub mod settings;

pub use crate::config::{ConfigSource, ConnectionConfig, ConnectionParams, ConnectionSpec};
pub use driver::{Connection, Cursor, Driver, DriverCursor, Row, SqliteDriver};
pub use errors::{AppError, AppResult, ConfigError, DriverError, DriverResult, ScopeError};
pub use prompt::{PasswordPrompt, TerminalPrompt};
pub use scope::{with_connection, DbConnector, ScopeState};
