//! Key-value persistence for the three kiosk blobs.
//!
//! Every value is a JSON document stored under a fixed key. Decoding is
//! validated here: a blob that no longer matches its type is logged and
//! replaced by an empty default instead of failing later.

use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

pub const EMPLOYEES_KEY: &str = "employees";
pub const RECORDS_KEY: &str = "records";
pub const SIGNATURES_KEY: &str = "faceDescriptors";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("failed to encode {key}: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// String-keyed, string-valued persistent store.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
    /// Write several keys as one unit: either every entry lands or none does.
    fn set_many(&mut self, entries: &[(&str, &str)]) -> Result<(), StoreError>;
    /// Remove every key.
    fn clear(&mut self) -> Result<(), StoreError>;
}

const UPSERT: &str = "INSERT INTO kv (key, value) VALUES (?1, ?2)
     ON CONFLICT(key) DO UPDATE SET value = excluded.value";

/// SQLite-backed store: one `kv` table, one row per key.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref())?;
        tracing::info!(path = %path.as_ref().display(), "opened attendance store");
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;
        Ok(Self { conn })
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.conn.execute(UPSERT, params![key, value])?;
        Ok(())
    }

    fn set_many(&mut self, entries: &[(&str, &str)]) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        for (key, value) in entries {
            tx.execute(UPSERT, params![key, value])?;
        }
        tx.commit()?;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.conn.execute("DELETE FROM kv", [])?;
        Ok(())
    }
}

/// In-process store with no durability.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn set_many(&mut self, entries: &[(&str, &str)]) -> Result<(), StoreError> {
        for (key, value) in entries {
            self.entries.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.entries.clear();
        Ok(())
    }
}

/// Load and decode the blob under `key`.
///
/// A missing key yields `T::default()`. A blob that fails to decode is
/// logged and also yields `T::default()`; it is overwritten on the next save.
pub fn load<T, S>(store: &S, key: &str) -> Result<T, StoreError>
where
    T: DeserializeOwned + Default,
    S: KeyValueStore + ?Sized,
{
    let Some(raw) = store.get(key)? else {
        return Ok(T::default());
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Ok(value),
        Err(e) => {
            tracing::warn!(key, error = %e, "stored data is malformed; resetting to empty");
            Ok(T::default())
        }
    }
}

/// Encode `value` as JSON and store it under `key`.
pub fn save<T, S>(store: &mut S, key: &str, value: &T) -> Result<(), StoreError>
where
    T: Serialize + ?Sized,
    S: KeyValueStore + ?Sized,
{
    let raw = encode(key, value)?;
    store.set(key, &raw)
}

/// Serialize `value` as the JSON blob stored under `key`.
pub fn encode<T: Serialize + ?Sized>(key: &str, value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|source| StoreError::Encode {
        key: key.to_string(),
        source,
    })
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Memory store whose writes touching `fail_key` fail as if the disk were full.
    #[derive(Default)]
    pub struct FailingStore {
        pub inner: MemoryStore,
        pub fail_key: Option<&'static str>,
    }

    impl FailingStore {
        fn check(&self, key: &str) -> Result<(), StoreError> {
            if self.fail_key == Some(key) {
                let full = rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_FULL);
                return Err(StoreError::Sqlite(rusqlite::Error::SqliteFailure(full, None)));
            }
            Ok(())
        }
    }

    impl KeyValueStore for FailingStore {
        fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            self.inner.get(key)
        }

        fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
            self.check(key)?;
            self.inner.set(key, value)
        }

        fn set_many(&mut self, entries: &[(&str, &str)]) -> Result<(), StoreError> {
            for (key, _) in entries {
                self.check(key)?;
            }
            self.inner.set_many(entries)
        }

        fn clear(&mut self) -> Result<(), StoreError> {
            self.inner.clear()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Employee, SignatureRoster};

    #[test]
    fn test_sqlite_get_missing_key() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.get("employees").unwrap(), None);
    }

    #[test]
    fn test_sqlite_set_overwrites() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.set("records", "[]").unwrap();
        store.set("records", "[1]").unwrap();
        assert_eq!(store.get("records").unwrap().as_deref(), Some("[1]"));
    }

    #[test]
    fn test_sqlite_set_many_writes_every_key() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.set("records", "[]").unwrap();
        store
            .set_many(&[("employees", "[1]"), ("records", "[2]")])
            .unwrap();
        assert_eq!(store.get("employees").unwrap().as_deref(), Some("[1]"));
        assert_eq!(store.get("records").unwrap().as_deref(), Some("[2]"));
    }

    #[test]
    fn test_sqlite_set_many_rolls_back_on_failure() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.set("employees", "[]").unwrap();
        // A trigger rejects the second write inside the transaction.
        store
            .conn
            .execute_batch(
                "CREATE TRIGGER reject_records BEFORE INSERT ON kv WHEN NEW.key = 'records'
                 BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
            )
            .unwrap();
        let err = store.set_many(&[("employees", "[1]"), ("records", "[2]")]);
        assert!(err.is_err());
        assert_eq!(store.get("employees").unwrap().as_deref(), Some("[]"));
        assert_eq!(store.get("records").unwrap(), None);
    }

    #[test]
    fn test_sqlite_clear() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.set("a", "1").unwrap();
        store.set("b", "2").unwrap();
        store.clear().unwrap();
        assert_eq!(store.get("a").unwrap(), None);
        assert_eq!(store.get("b").unwrap(), None);
    }

    #[test]
    fn test_sqlite_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attendance.db");
        {
            let mut store = SqliteStore::open(&path).unwrap();
            store.set(EMPLOYEES_KEY, r#"[{"name":"A","pin":"1111","companyNumber":"1"}]"#).unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        let employees: Vec<Employee> = load(&store, EMPLOYEES_KEY).unwrap();
        assert_eq!(employees.len(), 1);
        assert_eq!(employees[0].name, "A");
    }

    #[test]
    fn test_load_missing_defaults() {
        let store = MemoryStore::new();
        let roster: SignatureRoster = load(&store, SIGNATURES_KEY).unwrap();
        assert!(roster.is_empty());
    }

    #[test]
    fn test_load_malformed_resets_to_default() {
        let mut store = MemoryStore::new();
        store.set(EMPLOYEES_KEY, "{not json").unwrap();
        let employees: Vec<Employee> = load(&store, EMPLOYEES_KEY).unwrap();
        assert!(employees.is_empty());
    }

    #[test]
    fn test_load_wrong_shape_resets_to_default() {
        let mut store = MemoryStore::new();
        // Valid JSON, but a map where a list is expected.
        store.set(EMPLOYEES_KEY, r#"{"name":"A"}"#).unwrap();
        let employees: Vec<Employee> = load(&store, EMPLOYEES_KEY).unwrap();
        assert!(employees.is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let mut store = MemoryStore::new();
        let employees = vec![Employee {
            name: "Carol".into(),
            pin: "1234".into(),
            company_number: "C100".into(),
        }];
        save(&mut store, EMPLOYEES_KEY, &employees).unwrap();
        let loaded: Vec<Employee> = load(&store, EMPLOYEES_KEY).unwrap();
        assert_eq!(loaded, employees);
    }
}
