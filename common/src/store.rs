//! The key/value store contract (§4.2) and its two interchangeable
//! implementations.
//!
//! Both the manager (task store, event store) and the worker (task store)
//! hold a `Store<T>` rather than a concrete type, so swapping `memory` for
//! `persistent` at construction time never touches caller code.

use crate::{Error, Result};
use rusqlite::Connection;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// A typed key/value store keyed by string. All operations are synchronous
/// and must be safe to call from multiple loops in the same process — each
/// implementation serializes its own mutating operations internally rather
/// than asking callers to hold an external lock.
pub trait Store<T>: Send + Sync {
    fn put(&self, key: &str, value: T) -> Result<()>;
    fn get(&self, key: &str) -> Result<Option<T>>;
    fn list(&self) -> Result<Vec<T>>;
    fn count(&self) -> Result<usize>;
}

/// Not durable, no cross-process visibility. Backed by a `Mutex<HashMap>`,
/// the same primitive the rate limiter in `server/src/api.rs` used to guard
/// its shared map.
#[derive(Default)]
pub struct MemoryStore<T> {
    inner: Mutex<HashMap<String, T>>,
}

impl<T> MemoryStore<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }
}

impl<T: Clone + Send + Sync> Store<T> for MemoryStore<T> {
    fn put(&self, key: &str, value: T) -> Result<()> {
        let mut guard = self.inner.lock().unwrap();
        guard.insert(key.to_string(), value);
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<T>> {
        let guard = self.inner.lock().unwrap();
        Ok(guard.get(key).cloned())
    }

    fn list(&self) -> Result<Vec<T>> {
        let guard = self.inner.lock().unwrap();
        Ok(guard.values().cloned().collect())
    }

    fn count(&self) -> Result<usize> {
        let guard = self.inner.lock().unwrap();
        Ok(guard.len())
    }
}

/// A durable, single-file store. Each value is wrapped in a small
/// self-describing record (`schema_version` + JSON payload) and written to
/// one generic table keyed by the UUID string callers pass in — the
/// single-bucket shape of the original bbolt-backed store, expressed with
/// the WAL-mode rusqlite connection this workspace already uses for its
/// durable tables.
pub struct SqliteStore<T> {
    conn: Mutex<Connection>,
    table: String,
    _marker: std::marker::PhantomData<T>,
}

const SCHEMA_VERSION: i64 = 1;

impl<T: Serialize + DeserializeOwned> SqliteStore<T> {
    /// Opens (creating if absent) a single-file store at `path`, mode 0600,
    /// with one table named `table`. Exclusive per file: a second process
    /// opening the same path contends on the same WAL-mode connection
    /// rules as the rest of this workspace's SQLite usage.
    pub fn open(path: impl AsRef<Path>, table: &str) -> Result<Self> {
        let path: PathBuf = path.as_ref().to_path_buf();
        let conn = Connection::open(&path)
            .map_err(|e| Error::Store(format!("failed to open {}: {e}", path.display())))?;

        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| Error::Store(e.to_string()))?;
        conn.busy_timeout(std::time::Duration::from_secs(30))
            .map_err(|e| Error::Store(e.to_string()))?;

        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    key TEXT PRIMARY KEY,
                    schema_version INTEGER NOT NULL,
                    payload TEXT NOT NULL
                )"
            ),
            [],
        )
        .map_err(|e| Error::Store(e.to_string()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Ok(metadata) = std::fs::metadata(&path) {
                let mut perms = metadata.permissions();
                perms.set_mode(0o600);
                let _ = std::fs::set_permissions(&path, perms);
            }
        }

        Ok(Self {
            conn: Mutex::new(conn),
            table: table.to_string(),
            _marker: std::marker::PhantomData,
        })
    }
}

impl<T: Serialize + DeserializeOwned + Send + Sync> Store<T> for SqliteStore<T> {
    fn put(&self, key: &str, value: T) -> Result<()> {
        let payload = serde_json::to_string(&value)
            .map_err(|e| Error::Store(format!("serialize failed: {e}")))?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!(
                "INSERT INTO {} (key, schema_version, payload) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET schema_version = excluded.schema_version, payload = excluded.payload",
                self.table
            ),
            rusqlite::params![key, SCHEMA_VERSION, payload],
        )
        .map_err(|e| Error::Store(e.to_string()))?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<T>> {
        let conn = self.conn.lock().unwrap();
        let payload: Option<String> = conn
            .query_row(
                &format!("SELECT payload FROM {} WHERE key = ?1", self.table),
                [key],
                |row| row.get(0),
            )
            .ok();

        match payload {
            Some(payload) => {
                let value = serde_json::from_str(&payload)
                    .map_err(|e| Error::Store(format!("deserialize failed: {e}")))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn list(&self) -> Result<Vec<T>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(&format!("SELECT payload FROM {}", self.table))
            .map_err(|e| Error::Store(e.to_string()))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| Error::Store(e.to_string()))?;

        let mut values = Vec::new();
        for row in rows {
            let payload = row.map_err(|e| Error::Store(e.to_string()))?;
            let value = serde_json::from_str(&payload)
                .map_err(|e| Error::Store(format!("deserialize failed: {e}")))?;
            values.push(value);
        }
        Ok(values)
    }

    fn count(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", self.table), [], |row| {
                row.get(0)
            })
            .map_err(|e| Error::Store(e.to_string()))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Widget {
        name: String,
        count: u32,
    }

    #[test]
    fn memory_store_put_get_list_count() {
        let store: MemoryStore<Widget> = MemoryStore::new();
        assert_eq!(store.count().unwrap(), 0);
        assert!(store.get("a").unwrap().is_none());

        store
            .put(
                "a",
                Widget {
                    name: "a".into(),
                    count: 1,
                },
            )
            .unwrap();
        store
            .put(
                "b",
                Widget {
                    name: "b".into(),
                    count: 2,
                },
            )
            .unwrap();

        assert_eq!(store.count().unwrap(), 2);
        assert_eq!(store.get("a").unwrap().unwrap().count, 1);
        assert_eq!(store.list().unwrap().len(), 2);
    }

    #[test]
    fn sqlite_store_round_trips_and_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("widgets.db");

        {
            let store: SqliteStore<Widget> = SqliteStore::open(&path, "widgets").unwrap();
            store
                .put(
                    "w1",
                    Widget {
                        name: "w1".into(),
                        count: 7,
                    },
                )
                .unwrap();
        }

        // Reopen to simulate a process restart.
        let store: SqliteStore<Widget> = SqliteStore::open(&path, "widgets").unwrap();
        let got = store.get("w1").unwrap().unwrap();
        assert_eq!(got, Widget { name: "w1".into(), count: 7 });
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn sqlite_store_put_overwrites_same_key() {
        let dir = tempfile::tempdir().unwrap();
        let store: SqliteStore<Widget> =
            SqliteStore::open(dir.path().join("widgets.db"), "widgets").unwrap();

        store
            .put("w1", Widget { name: "w1".into(), count: 1 })
            .unwrap();
        store
            .put("w1", Widget { name: "w1".into(), count: 2 })
            .unwrap();

        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(store.get("w1").unwrap().unwrap().count, 2);
    }
}
