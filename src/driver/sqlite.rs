//! SQLite backend built on `rusqlite`.
//!
//! `database` names the database file; host, port, user and password have no
//! meaning for an embedded database and are ignored. A transaction is opened
//! with `BEGIN` before the first statement whenever the connection is in
//! autocommit mode, which gives the same implicit-transaction behaviour as a
//! client/server driver.

use super::{blob_value, float_value, Connection, Cursor, Driver, Row};
use crate::config::ConnectionConfig;
use crate::errors::{DriverError, DriverResult};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::params_from_iter;
use serde_json::Value;
use std::collections::VecDeque;
use std::rc::Rc;
use tracing::{debug, info, warn};

/// Database used when the configuration names none
pub const DEFAULT_DATABASE: &str = ":memory:";

#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteDriver;

impl SqliteDriver {
    pub fn new() -> Self {
        Self
    }
}

impl Driver for SqliteDriver {
    type Connection = SqliteConnection;

    fn connect(&self, config: &ConnectionConfig) -> DriverResult<SqliteConnection> {
        let path = config.database.as_deref().unwrap_or(DEFAULT_DATABASE);
        let conn = rusqlite::Connection::open(path)?;

        info!("SQLite connection established: {}", path);
        Ok(SqliteConnection {
            conn: Rc::new(conn),
        })
    }
}

pub struct SqliteConnection {
    conn: Rc<rusqlite::Connection>,
}

impl SqliteConnection {
    fn in_transaction(&self) -> bool {
        !self.conn.is_autocommit()
    }
}

impl Connection for SqliteConnection {
    type Cursor = SqliteCursor;

    fn cursor(&mut self) -> DriverResult<SqliteCursor> {
        Ok(SqliteCursor {
            conn: Rc::clone(&self.conn),
            rows: None,
        })
    }

    fn commit(&mut self) -> DriverResult<()> {
        if self.in_transaction() {
            self.conn.execute_batch("COMMIT")?;
            debug!("SQLite transaction committed");
        }
        Ok(())
    }

    fn rollback(&mut self) -> DriverResult<()> {
        if self.in_transaction() {
            self.conn.execute_batch("ROLLBACK")?;
            debug!("SQLite transaction rolled back");
        }
        Ok(())
    }

    fn close(self) -> DriverResult<()> {
        match Rc::try_unwrap(self.conn) {
            Ok(conn) => conn.close().map_err(|(_, e)| DriverError::Sqlite(e)),
            Err(_) => {
                // A cursor still holds the handle; it is released with the cursor
                warn!("SQLite connection closed while a cursor is still open");
                Ok(())
            }
        }
    }
}

pub struct SqliteCursor {
    conn: Rc<rusqlite::Connection>,
    rows: Option<VecDeque<Row>>,
}

impl Cursor for SqliteCursor {
    fn execute(&mut self, sql: &str, params: &[Value]) -> DriverResult<u64> {
        if self.conn.is_autocommit() {
            self.conn.execute_batch("BEGIN")?;
        }

        let bound = params
            .iter()
            .enumerate()
            .map(|(index, value)| to_sql_value(index, value))
            .collect::<DriverResult<Vec<_>>>()?;

        let mut stmt = self.conn.prepare(sql)?;
        if stmt.column_count() == 0 {
            let changed = stmt.execute(params_from_iter(bound))?;
            self.rows = None;
            debug!("Statement affected {} rows", changed);
            return Ok(changed as u64);
        }

        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt.query(params_from_iter(bound))?;
        let mut buffered = VecDeque::new();
        while let Some(row) = rows.next()? {
            let mut fields = Vec::with_capacity(columns.len());
            for (i, column) in columns.iter().enumerate() {
                fields.push((column.clone(), from_sql_value(row.get_ref(i)?)));
            }
            buffered.push_back(Row::new(fields));
        }

        let count = buffered.len() as u64;
        debug!("Query returned {} rows", count);
        self.rows = Some(buffered);
        Ok(count)
    }

    fn fetch_all(&mut self) -> DriverResult<Vec<Row>> {
        let rows = self.rows.as_mut().ok_or(DriverError::NoResultSet)?;
        Ok(rows.drain(..).collect())
    }

    fn fetch_one(&mut self) -> DriverResult<Option<Row>> {
        let rows = self.rows.as_mut().ok_or(DriverError::NoResultSet)?;
        Ok(rows.pop_front())
    }

    fn close(self) -> DriverResult<()> {
        Ok(())
    }
}

fn to_sql_value(index: usize, value: &Value) -> DriverResult<SqlValue> {
    Ok(match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().ok_or_else(|| {
                DriverError::UnsupportedParameter {
                    index,
                    reason: format!("number {} does not fit a SQLite value", n),
                }
            })?),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Array(_) | Value::Object(_) => SqlValue::Text(value.to_string()),
    })
}

fn from_sql_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => float_value(f),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => blob_value(bytes),
    }
}
