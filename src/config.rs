//! Connection configuration resolution.
//!
//! A [`ConnectionSpec`] is what the caller hands over: either a config source
//! (an inline mapping or a path to a JSON file) or discrete connection
//! parameters, never both and never neither. Resolving it yields a fresh
//! [`ConnectionConfig`] on every call.

use crate::errors::ConfigError;
use crate::prompt::PasswordPrompt;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3306;

/// Keys understood in an inline mapping or a JSON config file
pub const CONFIG_KEYS: [&str; 5] = ["host", "port", "user", "password", "database"];

/// Fully resolved connection parameters
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: Option<String>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            user: String::new(),
            password: String::new(),
            database: None,
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .finish()
    }
}

impl ConnectionConfig {
    /// Build a configuration from a key/value mapping.
    ///
    /// Missing keys take the driver defaults; unknown keys are ignored.
    pub fn from_mapping(mapping: &Map<String, Value>) -> Result<Self, ConfigError> {
        for key in mapping.keys() {
            if !CONFIG_KEYS.contains(&key.as_str()) {
                warn!("Ignoring unknown connection config key: {}", key);
            }
        }

        serde_json::from_value(Value::Object(mapping.clone())).map_err(ConfigError::InvalidMapping)
    }

    /// Read a JSON document from disk and build a configuration from it
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        match serde_json::from_str::<Value>(&text).map_err(ConfigError::Json)? {
            Value::Object(mapping) => Self::from_mapping(&mapping),
            other => Err(ConfigError::NotAnObject(json_kind(&other))),
        }
    }
}

/// Where a configuration comes from when it is not given as discrete fields
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    Inline(Map<String, Value>),
    File(PathBuf),
}

/// Discrete connection parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionParams {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
}

impl ConnectionParams {
    pub fn is_empty(&self) -> bool {
        self.host.is_none()
            && self.port.is_none()
            && self.user.is_none()
            && self.password.is_none()
            && self.database.is_none()
    }
}

/// Caller input for a connection scope
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionSpec {
    source: Option<ConfigSource>,
    params: ConnectionParams,
}

impl ConnectionSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an inline key/value mapping
    pub fn mapping(mut self, mapping: Map<String, Value>) -> Self {
        self.source = Some(ConfigSource::Inline(mapping));
        self
    }

    /// Use a JSON config file, read on every resolution
    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = Some(ConfigSource::File(path.into()));
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.params.host = Some(host.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.params.port = Some(port);
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.params.user = Some(user.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.params.password = Some(password.into());
        self
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.params.database = Some(database.into());
        self
    }

    pub fn source(&self) -> Option<&ConfigSource> {
        self.source.as_ref()
    }

    /// Resolve into a fresh configuration.
    ///
    /// Mutual exclusivity is checked before any file is read or any
    /// password prompt is shown. `prompt` is only consulted for discrete
    /// parameters without a password.
    pub fn resolve(&self, prompt: &dyn PasswordPrompt) -> Result<ConnectionConfig, ConfigError> {
        match (&self.source, self.params.is_empty()) {
            (Some(_), false) => Err(ConfigError::Ambiguous),
            (None, true) => Err(ConfigError::NoSource),
            (Some(ConfigSource::File(path)), true) => {
                debug!("Loading connection config from {}", path.display());
                ConnectionConfig::from_json_file(path)
            }
            (Some(ConfigSource::Inline(mapping)), true) => ConnectionConfig::from_mapping(mapping),
            (None, false) => self.resolve_params(prompt),
        }
    }

    fn resolve_params(&self, prompt: &dyn PasswordPrompt) -> Result<ConnectionConfig, ConfigError> {
        let params = &self.params;
        let host = params.host.clone().ok_or(ConfigError::MissingField("host"))?;
        let user = params.user.clone().ok_or(ConfigError::MissingField("user"))?;

        let password = match &params.password {
            Some(password) => password.clone(),
            None => prompt
                .prompt_password(&format!("Password for {}@{}: ", user, host))
                .map_err(ConfigError::Prompt)?,
        };

        Ok(ConnectionConfig {
            host,
            port: params.port.unwrap_or(DEFAULT_PORT),
            user,
            password,
            database: params.database.clone(),
        })
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
