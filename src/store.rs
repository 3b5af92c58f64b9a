use rusqlite::{params, Connection, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::app_dirs::AppDirs;
use crate::error::{StoreError, StoreResult};

pub const INSPECTION_CONFIG_KEY: &str = "inspection_config";
pub const SOLVES_KEY: &str = "solves";
pub const SOLVES_NEXT_ID_KEY: &str = "solves_next_id";
pub const STEP_SOLVES_KEY: &str = "step_solves";
pub const STEP_SOLVES_NEXT_ID_KEY: &str = "step_solves_next_id";
pub const STEP_DRILLS_KEY: &str = "step_drills";

/// Persistent key-value store holding JSON values
pub trait KeyValueStore {
    /// Returns Ok(None) when the key has never been written.
    fn load(&self, key: &str) -> StoreResult<Option<Value>>;
    fn save(&self, key: &str, value: &Value) -> StoreResult<()>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Box<T> {
    fn load(&self, key: &str) -> StoreResult<Option<Value>> {
        (**self).load(key)
    }

    fn save(&self, key: &str, value: &Value) -> StoreResult<()> {
        (**self).save(key, value)
    }
}

/// Load and decode `key`, falling back to `default` when it is absent,
/// unreadable or malformed
pub fn load_or<T, S>(store: &S, key: &str, default: T) -> T
where
    T: DeserializeOwned,
    S: KeyValueStore + ?Sized,
{
    match store.load(key) {
        Ok(Some(value)) => match serde_json::from_value(value) {
            Ok(decoded) => decoded,
            Err(source) => {
                let err = StoreError::Json {
                    key: key.to_string(),
                    source,
                };
                warn!(error = %err, "falling back to default");
                default
            }
        },
        Ok(None) => default,
        Err(err) => {
            warn!(key, error = %err, "store read failed, falling back to default");
            default
        }
    }
}

/// Load a JSON array under `key`, decoding each element on its own.
/// Elements that fail to decode are skipped so the rest survive.
pub fn load_each<T, S>(store: &S, key: &str) -> Vec<T>
where
    T: DeserializeOwned,
    S: KeyValueStore + ?Sized,
{
    let items: Vec<Value> = load_or(store, key, Vec::new());
    items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value(item) {
            Ok(decoded) => Some(decoded),
            Err(source) => {
                let err = StoreError::Json {
                    key: key.to_string(),
                    source,
                };
                warn!(index, error = %err, "skipping unreadable entry");
                None
            }
        })
        .collect()
}

/// Encode and write `value` under `key`
pub fn save_as<T, S>(store: &S, key: &str, value: &T) -> StoreResult<()>
where
    T: Serialize + ?Sized,
    S: KeyValueStore + ?Sized,
{
    let json = serde_json::to_value(value).map_err(|source| StoreError::Json {
        key: key.to_string(),
        source,
    })?;
    store.save(key, &json)
}

/// SQLite-backed store, one row per key
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open the store at the default state directory location
    pub fn new() -> StoreResult<Self> {
        let db_path = AppDirs::db_path().unwrap_or_else(|| PathBuf::from("twisty.db"));
        Self::with_path(db_path)
    }

    pub fn with_path<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        debug!(path = %path.display(), "opened store");
        Self::init(conn)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> StoreResult<Self> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
            [],
        )?;

        Ok(SqliteStore { conn })
    }

    /// Write a raw, possibly invalid, value. Used to exercise recovery paths.
    pub fn save_raw(&self, key: &str, raw: &str) -> StoreResult<()> {
        self.upsert(key, raw)
    }

    fn upsert(&self, key: &str, text: &str) -> StoreResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO kv (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
            params![key, text, chrono::Local::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

impl KeyValueStore for SqliteStore {
    fn load(&self, key: &str) -> StoreResult<Option<Value>> {
        let text: Option<String> = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;

        match text {
            Some(text) => serde_json::from_str(&text)
                .map(Some)
                .map_err(|source| StoreError::Json {
                    key: key.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    fn save(&self, key: &str, value: &Value) -> StoreResult<()> {
        self.upsert(key, &value.to_string())
    }
}

/// Volatile store for tests and `--memory` sessions
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RefCell<HashMap<String, String>>,
    fail_writes: Cell<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent save fail, to simulate a full or read-only disk
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }

    pub fn save_raw(&self, key: &str, raw: &str) {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), raw.to_string());
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }
}

impl KeyValueStore for MemoryStore {
    fn load(&self, key: &str) -> StoreResult<Option<Value>> {
        match self.entries.borrow().get(key) {
            Some(text) => serde_json::from_str(text)
                .map(Some)
                .map_err(|source| StoreError::Json {
                    key: key.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    fn save(&self, key: &str, value: &Value) -> StoreResult<()> {
        if self.fail_writes.get() {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "writes disabled",
            )));
        }
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
