//! MySQL backend built on the `mysql` crate.
//!
//! A transaction is started lazily before the first statement and finished
//! by `commit`/`rollback`, mirroring a client with autocommit disabled.

use super::{blob_value, float_value, Connection, Cursor, Driver, Row};
use crate::config::ConnectionConfig;
use crate::errors::{DriverError, DriverResult};
use ::mysql::prelude::Queryable;
use ::mysql::{Conn, OptsBuilder, Params, Value as MyValue};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use tracing::{debug, info};

#[derive(Debug, Default, Clone, Copy)]
pub struct MySqlDriver;

impl MySqlDriver {
    pub fn new() -> Self {
        Self
    }
}

impl Driver for MySqlDriver {
    type Connection = MySqlConnection;

    fn connect(&self, config: &ConnectionConfig) -> DriverResult<MySqlConnection> {
        let opts = OptsBuilder::new()
            .ip_or_hostname(Some(config.host.clone()))
            .tcp_port(config.port)
            .user(Some(config.user.clone()))
            .pass(Some(config.password.clone()))
            .db_name(config.database.clone());

        let conn = Conn::new(opts)?;
        info!(
            "MySQL connection established: {}@{}:{}",
            config.user, config.host, config.port
        );

        Ok(MySqlConnection {
            inner: Rc::new(RefCell::new(Inner {
                conn,
                in_transaction: false,
            })),
        })
    }
}

struct Inner {
    conn: Conn,
    in_transaction: bool,
}

impl Inner {
    fn begin_if_needed(&mut self) -> DriverResult<()> {
        if !self.in_transaction {
            self.conn.query_drop("START TRANSACTION")?;
            self.in_transaction = true;
        }
        Ok(())
    }

    fn finish(&mut self, statement: &str) -> DriverResult<()> {
        if self.in_transaction {
            self.conn.query_drop(statement)?;
            self.in_transaction = false;
            debug!("MySQL transaction finished with {}", statement);
        }
        Ok(())
    }
}

pub struct MySqlConnection {
    inner: Rc<RefCell<Inner>>,
}

impl Connection for MySqlConnection {
    type Cursor = MySqlCursor;

    fn cursor(&mut self) -> DriverResult<MySqlCursor> {
        Ok(MySqlCursor {
            inner: Rc::clone(&self.inner),
            rows: None,
        })
    }

    fn commit(&mut self) -> DriverResult<()> {
        self.inner.borrow_mut().finish("COMMIT")
    }

    fn rollback(&mut self) -> DriverResult<()> {
        self.inner.borrow_mut().finish("ROLLBACK")
    }

    fn close(self) -> DriverResult<()> {
        // The session ends when the last handle to `Conn` is dropped
        drop(self.inner);
        Ok(())
    }
}

pub struct MySqlCursor {
    inner: Rc<RefCell<Inner>>,
    rows: Option<VecDeque<Row>>,
}

impl Cursor for MySqlCursor {
    fn execute(&mut self, sql: &str, params: &[Value]) -> DriverResult<u64> {
        let bound = params
            .iter()
            .enumerate()
            .map(|(index, value)| to_mysql_value(index, value))
            .collect::<DriverResult<Vec<_>>>()?;
        let params = if bound.is_empty() {
            Params::Empty
        } else {
            Params::Positional(bound)
        };

        let mut inner = self.inner.borrow_mut();
        inner.begin_if_needed()?;

        let mut result = inner.conn.exec_iter(sql, params)?;
        let columns: Vec<String> = result
            .columns()
            .as_ref()
            .iter()
            .map(|column| column.name_str().into_owned())
            .collect();

        if columns.is_empty() {
            let affected = result.affected_rows();
            self.rows = None;
            debug!("Statement affected {} rows", affected);
            return Ok(affected);
        }

        let mut buffered = VecDeque::new();
        for row in result.by_ref() {
            let values = row?.unwrap();
            let fields = columns
                .iter()
                .cloned()
                .zip(values.into_iter().map(from_mysql_value))
                .collect();
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

fn to_mysql_value(index: usize, value: &Value) -> DriverResult<MyValue> {
    Ok(match value {
        Value::Null => MyValue::NULL,
        Value::Bool(b) => MyValue::Int(i64::from(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                MyValue::Int(i)
            } else if let Some(u) = n.as_u64() {
                MyValue::UInt(u)
            } else {
                MyValue::Double(n.as_f64().ok_or_else(|| DriverError::UnsupportedParameter {
                    index,
                    reason: format!("number {} does not fit a MySQL value", n),
                })?)
            }
        }
        Value::String(s) => MyValue::Bytes(s.clone().into_bytes()),
        Value::Array(_) | Value::Object(_) => MyValue::Bytes(value.to_string().into_bytes()),
    })
}

fn from_mysql_value(value: MyValue) -> Value {
    match value {
        MyValue::NULL => Value::Null,
        MyValue::Int(i) => Value::from(i),
        MyValue::UInt(u) => Value::from(u),
        MyValue::Float(f) => float_value(f64::from(f)),
        MyValue::Double(f) => float_value(f),
        MyValue::Bytes(bytes) => match String::from_utf8(bytes) {
            Ok(text) => Value::String(text),
            Err(e) => blob_value(e.as_bytes()),
        },
        MyValue::Date(year, month, day, hour, minute, second, micros) => {
            let mut text = format!(
                "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                year, month, day, hour, minute, second
            );
            if micros > 0 {
                text.push_str(&format!(".{:06}", micros));
            }
            Value::String(text)
        }
        MyValue::Time(negative, days, hours, minutes, seconds, micros) => {
            let total_hours = days * 24 + u32::from(hours);
            let mut text = format!(
                "{}{:02}:{:02}:{:02}",
                if negative { "-" } else { "" },
                total_hours,
                minutes,
                seconds
            );
            if micros > 0 {
                text.push_str(&format!(".{:06}", micros));
            }
            Value::String(text)
        }
    }
}
