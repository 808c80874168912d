//! Scoped connection lifecycle.
//!
//! [`with_connection`] resolves a configuration, connects, hands the callback
//! a cursor, commits or rolls back depending on the callback's outcome, and
//! always closes the cursor and then the connection.
//!
//! Per invocation the scope moves through
//! `Idle -> ConfigResolved -> Connected -> Executing -> (Committed | RolledBack) -> Closed`.

use crate::config::ConnectionSpec;
use crate::driver::{Connection, Cursor, Driver, DriverCursor};
use crate::errors::{DriverError, DriverResult, ScopeError};
use crate::prompt::{PasswordPrompt, TerminalPrompt};
use std::fmt;
use tracing::{debug, error, info, warn};

/// Lifecycle states of one scope invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeState {
    Idle,
    ConfigResolved,
    Connected,
    Executing,
    Committed,
    RolledBack,
    Closed,
}

impl fmt::Display for ScopeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScopeState::Idle => "idle",
            ScopeState::ConfigResolved => "config-resolved",
            ScopeState::Connected => "connected",
            ScopeState::Executing => "executing",
            ScopeState::Committed => "committed",
            ScopeState::RolledBack => "rolled-back",
            ScopeState::Closed => "closed",
        };
        f.write_str(name)
    }
}

fn enter(state: ScopeState) {
    debug!(state = %state, "connection scope");
}

/// An open connection and cursor owned by exactly one scope.
///
/// `finish` closes both explicitly. If the session is dropped without being
/// finished (the callback panicked), the open transaction is rolled back and
/// both handles are closed during unwinding.
struct Session<C: Connection> {
    conn: Option<C>,
    cursor: Option<C::Cursor>,
}

impl<C: Connection> Session<C> {
    fn open(mut conn: C) -> Result<Self, (DriverError, C)> {
        match conn.cursor() {
            Ok(cursor) => Ok(Self {
                conn: Some(conn),
                cursor: Some(cursor),
            }),
            Err(e) => Err((e, conn)),
        }
    }

    fn cursor(&mut self) -> &mut C::Cursor {
        self.cursor
            .as_mut()
            .unwrap_or_else(|| unreachable!("cursor is present until the session is finished"))
    }

    fn connection(&mut self) -> &mut C {
        self.conn
            .as_mut()
            .unwrap_or_else(|| unreachable!("connection is present until the session is finished"))
    }

    /// Close the cursor, then the connection. Both are attempted; the first
    /// failure is reported.
    fn finish(mut self) -> DriverResult<()> {
        let cursor_result = self.cursor.take().map_or(Ok(()), Cursor::close);
        let conn_result = self.conn.take().map_or(Ok(()), Connection::close);
        enter(ScopeState::Closed);

        if let (Err(cursor_err), Err(conn_err)) = (&cursor_result, &conn_result) {
            warn!(
                "Closing connection failed after cursor close failed: {} (cursor: {})",
                conn_err, cursor_err
            );
        }
        cursor_result.and(conn_result)
    }
}

impl<C: Connection> Drop for Session<C> {
    fn drop(&mut self) {
        if self.conn.is_none() {
            return;
        }

        warn!("Connection scope abandoned, rolling back");
        if let Some(cursor) = self.cursor.take() {
            if let Err(e) = cursor.close() {
                warn!("Failed to close cursor: {}", e);
            }
        }
        if let Some(mut conn) = self.conn.take() {
            if let Err(e) = conn.rollback() {
                warn!("Rollback failed: {}", e);
            }
            if let Err(e) = conn.close() {
                warn!("Failed to close connection: {}", e);
            }
        }
        enter(ScopeState::Closed);
    }
}

/// Run `callback` inside a connection scope.
///
/// The callback's error is returned untouched as [`ScopeError::Callback`]
/// after the transaction has been rolled back and the session closed. A
/// failure while closing only surfaces when nothing else went wrong.
pub fn with_connection<D, F, T, E>(
    driver: &D,
    spec: &ConnectionSpec,
    prompt: &dyn PasswordPrompt,
    callback: F,
) -> Result<T, ScopeError<E>>
where
    D: Driver,
    F: FnOnce(&mut DriverCursor<D>) -> Result<T, E>,
    E: fmt::Display,
{
    enter(ScopeState::Idle);
    let config = spec.resolve(prompt)?;
    enter(ScopeState::ConfigResolved);

    let conn = driver.connect(&config).map_err(ScopeError::Connect)?;
    enter(ScopeState::Connected);

    let mut session = match Session::open(conn) {
        Ok(session) => session,
        Err((e, conn)) => {
            if let Err(close_err) = conn.close() {
                warn!("Failed to close connection: {}", close_err);
            }
            enter(ScopeState::Closed);
            return Err(ScopeError::Cursor(e));
        }
    };

    enter(ScopeState::Executing);
    let outcome = match callback(session.cursor()) {
        Ok(value) => match session.connection().commit() {
            Ok(()) => {
                enter(ScopeState::Committed);
                Ok(value)
            }
            Err(e) => {
                error!("Commit failed: {}", e);
                rollback(session.connection());
                Err(ScopeError::Commit(e))
            }
        },
        Err(err) => {
            error!("An error occurred: {}", err);
            rollback(session.connection());
            Err(ScopeError::Callback(err))
        }
    };

    match (outcome, session.finish()) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(ScopeError::Close(e)),
        (Err(original), Err(e)) => {
            warn!("Failed to close session: {}", e);
            Err(original)
        }
        (Err(original), Ok(())) => Err(original),
    }
}

fn rollback<C: Connection>(conn: &mut C) {
    match conn.rollback() {
        Ok(()) => enter(ScopeState::RolledBack),
        Err(e) => warn!("Rollback failed: {}", e),
    }
}

/// A reusable connection scope: the driver, where its configuration comes
/// from, and how to ask for a missing password.
///
/// Configuration is resolved again on every call.
pub struct DbConnector<D> {
    driver: D,
    spec: ConnectionSpec,
    prompt: Box<dyn PasswordPrompt>,
}

impl<D: Driver> DbConnector<D> {
    pub fn new(driver: D, spec: ConnectionSpec) -> Self {
        Self {
            driver,
            spec,
            prompt: Box::new(TerminalPrompt),
        }
    }

    /// Replace the terminal prompt used for missing passwords
    pub fn with_prompt(mut self, prompt: impl PasswordPrompt + 'static) -> Self {
        self.prompt = Box::new(prompt);
        self
    }

    pub fn run<F, T, E>(&self, callback: F) -> Result<T, ScopeError<E>>
    where
        F: FnOnce(&mut DriverCursor<D>) -> Result<T, E>,
        E: fmt::Display,
    {
        info!("Opening connection scope");
        with_connection(&self.driver, &self.spec, self.prompt.as_ref(), callback)
    }

    /// Wrap `callback` so that each call runs in its own connection scope.
    ///
    /// The returned function takes the callback's remaining arguments and
    /// passes them through after the cursor.
    pub fn wrap<'a, A, F, T, E>(&'a self, callback: F) -> impl Fn(A) -> Result<T, ScopeError<E>> + 'a
    where
        F: Fn(&mut DriverCursor<D>, A) -> Result<T, E> + 'a,
        E: fmt::Display,
    {
        move |args| self.run(|cursor| callback(cursor, args))
    }
}
