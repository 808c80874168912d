//! Driver abstractions consumed by the connection scope.
//!
//! The scope never talks to a database library directly. It only sees the
//! three traits in this module, so any backend that can connect, hand out a
//! cursor, and commit/roll back/close can be plugged in.
//!
//! ## Backends
//!
//! - [`SqliteDriver`] - embedded SQLite via `rusqlite`
//! - `MySqlDriver` - MySQL over TCP via the `mysql` crate (feature `mysql`)

#[cfg(feature = "mysql")]
pub mod mysql;
pub mod sqlite;

#[cfg(feature = "mysql")]
pub use self::mysql::MySqlDriver;
pub use sqlite::SqliteDriver;

use crate::config::ConnectionConfig;
use crate::errors::DriverResult;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

/// Opens connections from a resolved configuration
pub trait Driver {
    type Connection: Connection;

    /// Open a new connection. A single attempt, no retries.
    fn connect(&self, config: &ConnectionConfig) -> DriverResult<Self::Connection>;
}

/// An open connection with an implicit transaction
pub trait Connection {
    type Cursor: Cursor;

    /// Open a cursor whose rows are keyed by field name
    fn cursor(&mut self) -> DriverResult<Self::Cursor>;

    fn commit(&mut self) -> DriverResult<()>;

    fn rollback(&mut self) -> DriverResult<()>;

    fn close(self) -> DriverResult<()>;
}

/// Statement execution and row retrieval
pub trait Cursor {
    /// Execute one statement with positional parameters.
    ///
    /// Returns the number of affected rows for statements without a result
    /// set, or the number of buffered rows for queries.
    fn execute(&mut self, sql: &str, params: &[Value]) -> DriverResult<u64>;

    /// Remaining rows of the last query
    fn fetch_all(&mut self) -> DriverResult<Vec<Row>>;

    /// Next row of the last query, `None` once exhausted
    fn fetch_one(&mut self) -> DriverResult<Option<Row>>;

    fn close(self) -> DriverResult<()>
    where
        Self: Sized;
}

/// The cursor type handed to callbacks for a given driver
pub type DriverCursor<D> = <<D as Driver>::Connection as Connection>::Cursor;

/// A result row keyed by field name, preserving column order
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    fields: Vec<(String, Value)>,
}

impl Row {
    /// Build a row from `(column, value)` pairs. A repeated column name
    /// keeps its first position and takes the last value.
    pub fn new(fields: Vec<(String, Value)>) -> Self {
        let mut deduped: Vec<(String, Value)> = Vec::with_capacity(fields.len());
        for (column, value) in fields {
            match deduped.iter_mut().find(|(existing, _)| *existing == column) {
                Some((_, slot)) => *slot = value,
                None => deduped.push((column, value)),
            }
        }
        Self { fields: deduped }
    }

    /// Value of the named field, `None` if the row has no such column
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, value)| value)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(column, _)| column.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields
            .iter()
            .map(|(column, value)| (column.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn into_json(self) -> serde_json::Map<String, Value> {
        self.fields.into_iter().collect()
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (column, value) in &self.fields {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

/// Map a float cell to JSON; NaN and infinities have no JSON form
pub(crate) fn float_value(f: f64) -> Value {
    serde_json::Number::from_f64(f)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Blobs are surfaced as lowercase hex strings
pub(crate) fn blob_value(bytes: &[u8]) -> Value {
    Value::String(hex::encode(bytes))
}
