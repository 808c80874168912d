use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Settings file looked up in the working directory (extension optional)
pub const SETTINGS_FILE: &str = "mysql-helper";

/// Environment prefix, e.g. `MYSQL_HELPER_DRIVER=sqlite`
pub const ENV_PREFIX: &str = "MYSQL_HELPER";

/// Which driver backend the command-line tool connects with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    Mysql,
    Sqlite,
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverKind::Mysql => f.write_str("mysql"),
            DriverKind::Sqlite => f.write_str("sqlite"),
        }
    }
}

/// Tool settings loaded from mysql-helper.toml or environment variables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub driver: DriverKind,
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        // Only default to a backend that is compiled in
        let driver = if cfg!(feature = "mysql") {
            DriverKind::Mysql
        } else {
            DriverKind::Sqlite
        };
        Self {
            driver,
            log_level: "error".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from mysql-helper.toml and environment variables.
    /// Environment variables take precedence over file configuration.
    pub fn load() -> Result<Self, ConfigError> {
        let defaults = Settings::default();
        let config = Config::builder()
            .set_default("driver", defaults.driver.to_string())?
            .set_default("log_level", defaults.log_level)?
            .add_source(File::with_name(SETTINGS_FILE).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()?;

        config.try_deserialize()
    }
}
