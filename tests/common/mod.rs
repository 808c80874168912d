//! Common Test Utilities
//!
//! Shared helpers used across the integration tests.

#![allow(dead_code)]


use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global test counter for generating unique test database paths
static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a unique test database path for a given test
///
/// Combines the test name, process ID and an atomic counter so parallel
/// tests never share a database file.
pub fn create_unique_test_db_path(test_name: &str) -> String {
    let test_dir = PathBuf::from("test_output/unit_tests");
    std::fs::create_dir_all(&test_dir).unwrap();

    let unique_id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
    let db_path = test_dir.join(format!(
        "{}_{}_{}.db",
        test_name,
        std::process::id(),
        unique_id
    ));
    db_path.to_str().unwrap().to_string()
}

/// Write `contents` to a fresh temporary file and keep it alive with the handle
pub fn write_temp_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".json")
        .tempfile()
        .unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

/// Database setup and teardown utilities
pub mod database {
    /// SQLite database file that is removed on drop
    pub struct TestDatabase {
        path: String,
    }

    impl TestDatabase {
        pub fn new(test_name: &str) -> Self {
            Self {
                path: super::create_unique_test_db_path(test_name),
            }
        }

        pub fn path(&self) -> &str {
            &self.path
        }
    }

    impl Drop for TestDatabase {
        fn drop(&mut self) {
            if std::path::Path::new(&self.path).exists() {
                let _ = std::fs::remove_file(&self.path);
            }
        }
    }
}
