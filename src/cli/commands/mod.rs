pub mod ping;
pub mod query;

use crate::config::ConnectionSpec;
use crate::driver::{Cursor, SqliteDriver};
use crate::errors::{AppError, AppResult, DriverResult};
use crate::prompt::TerminalPrompt;
use crate::scope::with_connection;
use crate::settings::DriverKind;
use clap::Args;
use std::path::PathBuf;
use tracing::info;

/// Connection options shared by every command
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// JSON config file with host/port/user/password/database
    #[arg(long, conflicts_with_all = ["host", "port", "user", "password", "database"])]
    pub config: Option<PathBuf>,

    /// Database host
    #[arg(long)]
    pub host: Option<String>,

    /// Database port (default 3306)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database user
    #[arg(long)]
    pub user: Option<String>,

    /// Database password (prompted without echo when omitted)
    #[arg(long)]
    pub password: Option<String>,

    /// Database name (file path for the sqlite driver)
    #[arg(long)]
    pub database: Option<String>,

    /// Driver backend (overrides mysql-helper.toml and env vars)
    #[arg(long, value_enum)]
    pub driver: Option<DriverKind>,
}

impl ConnectionArgs {
    pub fn spec(&self) -> ConnectionSpec {
        let mut spec = ConnectionSpec::new();
        if let Some(path) = &self.config {
            spec = spec.file(path);
        }
        if let Some(host) = &self.host {
            spec = spec.host(host);
        }
        if let Some(port) = self.port {
            spec = spec.port(port);
        }
        if let Some(user) = &self.user {
            spec = spec.user(user);
        }
        if let Some(password) = &self.password {
            spec = spec.password(password);
        }
        if let Some(database) = &self.database {
            spec = spec.database(database);
        }
        spec
    }
}

/// Run `work` in a connection scope on the selected driver
pub fn run_in_scope<T, F>(args: &ConnectionArgs, default_driver: DriverKind, work: F) -> AppResult<T>
where
    F: FnOnce(&mut dyn Cursor) -> DriverResult<T>,
{
    let driver = args.driver.unwrap_or(default_driver);
    let spec = args.spec();
    info!("Using {} driver", driver);

    match driver {
        DriverKind::Sqlite => Ok(with_connection(
            &SqliteDriver::new(),
            &spec,
            &TerminalPrompt,
            |cursor| work(cursor),
        )?),
        #[cfg(feature = "mysql")]
        DriverKind::Mysql => Ok(with_connection(
            &crate::driver::MySqlDriver::new(),
            &spec,
            &TerminalPrompt,
            |cursor| work(cursor),
        )?),
        #[cfg(not(feature = "mysql"))]
        DriverKind::Mysql => Err(AppError::InvalidData(
            "MySQL support is not compiled in; rebuild with --features mysql or use --driver sqlite"
                .to_string(),
        )),
    }
}
