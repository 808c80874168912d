//! Connection Scope Lifecycle Tests
//!
//! Drives `with_connection` against the recording driver and checks the
//! exact sequence of driver calls for every exit path.

use mysql_helper::config::ConnectionSpec;
use mysql_helper::driver::Cursor;
use mysql_helper::errors::{ConfigError, DriverError, ScopeError};
use mysql_helper::prompt::PasswordPrompt;
use mysql_helper::scope::{with_connection, DbConnector};
use serde_json::{json, Map, Value};
use std::cell::Cell;
use std::fmt;
use std::io;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use crate::common::recording_driver::{Event, Failures, RecordingDriver};
use crate::common::write_temp_config;

/// Error raised by test callbacks
#[derive(Debug, Clone, PartialEq)]
struct WorkFailed(String);

impl fmt::Display for WorkFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "work failed: {}", self.0)
    }
}

/// Log output collected by a test subscriber
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn never_prompt(_: &str) -> io::Result<String> {
    panic!("password prompt must not be shown")
}

fn inline_spec() -> ConnectionSpec {
    let mut mapping = Map::new();
    mapping.insert("host".to_string(), json!("127.0.0.1"));
    mapping.insert("user".to_string(), json!("root"));
    mapping.insert("password".to_string(), json!("123456"));
    mapping.insert("database".to_string(), json!("my_table"));
    ConnectionSpec::new().mapping(mapping)
}

fn session_events(tail: Event) -> Vec<Event> {
    vec![Event::OpenCursor, Event::Execute("SELECT 1".to_string()), tail]
}

#[test]
fn test_inline_config_opens_and_closes_once_on_success() {
    let driver = RecordingDriver::new();

    let result = with_connection(&driver, &inline_spec(), &never_prompt, |cursor| {
        cursor.execute("SELECT 1", &[])?;
        cursor.fetch_all()
    });

    let rows = result.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("sql"), Some(&json!("SELECT 1")));

    let events = driver.events();
    assert!(matches!(events[0], Event::Connect(_)));
    let mut expected = session_events(Event::Commit);
    expected.extend([Event::CloseCursor, Event::CloseConnection]);
    assert_eq!(&events[1..], expected.as_slice());
}

#[test]
fn test_inline_config_opens_and_closes_once_on_failure() {
    let driver = RecordingDriver::new();

    let result = with_connection(&driver, &inline_spec(), &never_prompt, |cursor| {
        cursor
            .execute("SELECT 1", &[])
            .map_err(|e| WorkFailed(e.to_string()))?;
        Err::<(), _>(WorkFailed("boom".to_string()))
    });
    assert!(result.is_err());

    assert_eq!(driver.count(&Event::Connect(Default::default())), 1);
    assert_eq!(driver.count(&Event::OpenCursor), 1);
    assert_eq!(driver.count(&Event::CloseCursor), 1);
    assert_eq!(driver.count(&Event::CloseConnection), 1);
    assert_eq!(driver.count(&Event::Commit), 0);
}

#[test]
fn test_callback_value_is_returned_and_committed() {
    let driver = RecordingDriver::new();

    let value = with_connection(&driver, &inline_spec(), &never_prompt, |_| {
        Ok::<_, WorkFailed>(vec!["alice", "bob"])
    })
    .unwrap();

    assert_eq!(value, vec!["alice", "bob"]);
    assert_eq!(driver.count(&Event::Commit), 1);
    assert_eq!(driver.count(&Event::Rollback), 0);
}

#[test]
fn test_callback_error_is_rolled_back_and_returned_unchanged() {
    let driver = RecordingDriver::new();

    let err = with_connection(&driver, &inline_spec(), &never_prompt, |_| {
        Err::<(), _>(WorkFailed("duplicate key".to_string()))
    })
    .unwrap_err();

    assert_eq!(err.to_string(), "work failed: duplicate key");
    assert_eq!(
        err.into_callback(),
        Some(WorkFailed("duplicate key".to_string()))
    );

    let events = driver.events();
    assert_eq!(
        &events[1..],
        &[
            Event::OpenCursor,
            Event::Rollback,
            Event::CloseCursor,
            Event::CloseConnection
        ]
    );
}

#[test]
fn test_callback_error_is_logged_before_rollback() {
    let driver = RecordingDriver::new();
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::ERROR)
        .finish();

    let result = tracing::subscriber::with_default(subscriber, || {
        with_connection(&driver, &inline_spec(), &never_prompt, |_| {
            Err::<(), _>(WorkFailed("duplicate key".to_string()))
        })
    });

    assert!(matches!(result, Err(ScopeError::Callback(_))));
    let output = logs.contents();
    assert!(
        output.contains("An error occurred: work failed: duplicate key"),
        "unexpected log output: {}",
        output
    );
    assert!(output.contains("ERROR"));
    assert_eq!(driver.count(&Event::Rollback), 1);
}

#[test]
fn test_successful_callback_logs_no_errors() {
    let driver = RecordingDriver::new();
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::ERROR)
        .finish();

    let result = tracing::subscriber::with_default(subscriber, || {
        with_connection(&driver, &inline_spec(), &never_prompt, |_| {
            Ok::<_, WorkFailed>(7)
        })
    });

    assert_eq!(result.unwrap(), 7);
    assert!(logs.contents().is_empty());
}

#[test]
fn test_file_and_params_together_fail_before_connecting() {
    let file = write_temp_config(r#"{"host": "127.0.0.1", "user": "root"}"#);
    let driver = RecordingDriver::new();
    let spec = ConnectionSpec::new()
        .file(file.path())
        .host("127.0.0.1")
        .user("root");

    let err = with_connection(&driver, &spec, &never_prompt, |_| Ok::<_, WorkFailed>(()))
        .unwrap_err();

    assert!(matches!(err, ScopeError::Config(ConfigError::Ambiguous)));
    assert!(driver.events().is_empty());
}

#[test]
fn test_no_source_and_no_host_user_fail() {
    let driver = RecordingDriver::new();

    for spec in [
        ConnectionSpec::new(),
        ConnectionSpec::new().password("secret").database("testdb"),
        ConnectionSpec::new().host("127.0.0.1"),
    ] {
        let err = with_connection(&driver, &spec, &never_prompt, |_| Ok::<_, WorkFailed>(()))
            .unwrap_err();
        assert!(err.is_config(), "expected config error, got {}", err);
    }
    assert!(driver.events().is_empty());
}

#[test]
fn test_malformed_json_file_fails_without_connecting() {
    let file = write_temp_config(r#"{"host": "127.0.0.1", "user": }"#);
    let driver = RecordingDriver::new();
    let spec = ConnectionSpec::new().file(file.path());

    let err = with_connection(&driver, &spec, &never_prompt, |_| Ok::<_, WorkFailed>(()))
        .unwrap_err();

    match err {
        ScopeError::Config(ConfigError::Json(parse_err)) => {
            assert!(parse_err.is_syntax());
        }
        other => panic!("expected JSON config error, got {:?}", other),
    }
    assert!(driver.events().is_empty());
}

#[test]
fn test_missing_file_fails_without_connecting() {
    let driver = RecordingDriver::new();
    let spec = ConnectionSpec::new().file("/nonexistent/mysql-helper/db.json");

    let err = with_connection(&driver, &spec, &never_prompt, |_| Ok::<_, WorkFailed>(()))
        .unwrap_err();

    assert!(matches!(err, ScopeError::Config(ConfigError::Read { .. })));
    assert!(driver.events().is_empty());
}

#[test]
fn test_discrete_params_resolve_default_port() {
    let driver = RecordingDriver::new();
    let spec = ConnectionSpec::new()
        .host("127.0.0.1")
        .user("root")
        .password("secret")
        .database("testdb");

    with_connection(&driver, &spec, &never_prompt, |_| Ok::<_, WorkFailed>(())).unwrap();

    let config = driver.last_config().unwrap();
    assert_eq!(config.port, 3306);
    assert_eq!(config.host, "127.0.0.1");
    assert_eq!(config.user, "root");
    assert_eq!(config.password, "secret");
    assert_eq!(config.database.as_deref(), Some("testdb"));
}

#[test]
fn test_json_file_config_reaches_driver() {
    let file = write_temp_config(
        r#"{"host": "db.internal", "port": 3307, "user": "app", "password": "pw", "database": "shop"}"#,
    );
    let driver = RecordingDriver::new();
    let spec = ConnectionSpec::new().file(file.path());

    with_connection(&driver, &spec, &never_prompt, |_| Ok::<_, WorkFailed>(())).unwrap();

    let config = driver.last_config().unwrap();
    assert_eq!(config.host, "db.internal");
    assert_eq!(config.port, 3307);
    assert_eq!(config.database.as_deref(), Some("shop"));
}

#[test]
fn test_missing_password_prompts_once_per_invocation() {
    let prompts = Cell::new(0);
    let prompt = |_: &str| -> io::Result<String> {
        prompts.set(prompts.get() + 1);
        Ok("typed-secret".to_string())
    };
    let driver = RecordingDriver::new();
    let spec = ConnectionSpec::new().host("127.0.0.1").user("root");

    for _ in 0..2 {
        with_connection(&driver, &spec, &prompt, |_| Ok::<_, WorkFailed>(())).unwrap();
    }

    assert_eq!(prompts.get(), 2);
    assert_eq!(driver.last_config().unwrap().password, "typed-secret");
}

#[test]
fn test_connect_failure_propagates_without_cleanup_calls() {
    let driver = RecordingDriver::failing(Failures {
        connect: true,
        ..Failures::default()
    });

    let err = with_connection(&driver, &inline_spec(), &never_prompt, |_| {
        Ok::<_, WorkFailed>(())
    })
    .unwrap_err();

    assert!(matches!(err, ScopeError::Connect(DriverError::Backend(_))));
    assert_eq!(driver.events().len(), 1);
}

#[test]
fn test_cursor_failure_still_closes_connection() {
    let driver = RecordingDriver::failing(Failures {
        cursor: true,
        ..Failures::default()
    });

    let err = with_connection(&driver, &inline_spec(), &never_prompt, |_| {
        Ok::<_, WorkFailed>(())
    })
    .unwrap_err();

    assert!(matches!(err, ScopeError::Cursor(_)));
    assert_eq!(
        &driver.events()[1..],
        &[Event::OpenCursor, Event::CloseConnection]
    );
}

#[test]
fn test_commit_failure_rolls_back_and_closes() {
    let driver = RecordingDriver::failing(Failures {
        commit: true,
        ..Failures::default()
    });

    let err = with_connection(&driver, &inline_spec(), &never_prompt, |_| {
        Ok::<_, WorkFailed>(1)
    })
    .unwrap_err();

    assert!(matches!(err, ScopeError::Commit(_)));
    assert_eq!(
        &driver.events()[1..],
        &[
            Event::OpenCursor,
            Event::Commit,
            Event::Rollback,
            Event::CloseCursor,
            Event::CloseConnection
        ]
    );
}

#[test]
fn test_rollback_failure_does_not_mask_callback_error() {
    let driver = RecordingDriver::failing(Failures {
        rollback: true,
        close_cursor: true,
        ..Failures::default()
    });

    let err = with_connection(&driver, &inline_spec(), &never_prompt, |_| {
        Err::<(), _>(WorkFailed("original".to_string()))
    })
    .unwrap_err();

    assert_eq!(err.into_callback(), Some(WorkFailed("original".to_string())));
    // The connection is still closed after the cursor close failed
    assert_eq!(driver.count(&Event::CloseConnection), 1);
}

#[test]
fn test_close_failure_surfaces_after_successful_work() {
    let driver = RecordingDriver::failing(Failures {
        close_connection: true,
        ..Failures::default()
    });

    let err = with_connection(&driver, &inline_spec(), &never_prompt, |_| {
        Ok::<_, WorkFailed>(())
    })
    .unwrap_err();

    assert!(matches!(err, ScopeError::Close(_)));
    assert_eq!(driver.count(&Event::Commit), 1);
    assert_eq!(driver.count(&Event::CloseCursor), 1);
}

#[test]
fn test_panicking_callback_still_rolls_back_and_closes() {
    let driver = RecordingDriver::new();

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        with_connection(&driver, &inline_spec(), &never_prompt, |_| -> Result<(), WorkFailed> {
            panic!("callback blew up")
        })
    }));
    assert!(outcome.is_err());

    assert_eq!(
        &driver.events()[1..],
        &[
            Event::OpenCursor,
            Event::CloseCursor,
            Event::Rollback,
            Event::CloseConnection
        ]
    );
}

#[test]
fn test_connector_reresolves_config_on_every_call() {
    let file = write_temp_config(r#"{"host": "first", "user": "root"}"#);
    let driver = RecordingDriver::new();
    let connector =
        DbConnector::new(driver.clone(), ConnectionSpec::new().file(file.path())).with_prompt(never_prompt);

    connector.run(|_| Ok::<_, WorkFailed>(())).unwrap();
    assert_eq!(driver.last_config().unwrap().host, "first");

    std::fs::write(file.path(), r#"{"host": "second", "user": "root"}"#).unwrap();
    connector.run(|_| Ok::<_, WorkFailed>(())).unwrap();
    assert_eq!(driver.last_config().unwrap().host, "second");
}

#[test]
fn test_wrapped_function_receives_cursor_and_arguments() {
    let driver = RecordingDriver::new();
    let connector = DbConnector::new(driver.clone(), inline_spec()).with_prompt(never_prompt);

    let lookup = connector.wrap(|cursor, (table, limit): (String, u32)| {
        let sql = format!("SELECT name FROM {} LIMIT {}", table, limit);
        cursor.execute(&sql, &[]).map_err(|e| WorkFailed(e.to_string()))?;
        let row = cursor.fetch_one().map_err(|e| WorkFailed(e.to_string()))?;
        Ok::<Option<Value>, WorkFailed>(row.and_then(|r| r.get("sql").cloned()))
    });

    assert_eq!(
        lookup(("my_table".to_string(), 1)).unwrap(),
        Some(json!("SELECT name FROM my_table LIMIT 1"))
    );
    assert_eq!(driver.count(&Event::Commit), 1);
    assert_eq!(driver.count(&Event::CloseConnection), 1);
}

#[test]
fn test_prompt_trait_accepts_closures() {
    let prompt = |message: &str| -> io::Result<String> { Ok(message.to_uppercase()) };
    assert_eq!(prompt.prompt_password("pw").unwrap(), "PW");
}
