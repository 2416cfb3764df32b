use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{ClipError, ClipResult};
use crate::history::clamp_capacity;
use crate::models::{ClipboardEntry, HotkeyModifiers, Settings, MAX_FONT_SIZE, MIN_FONT_SIZE};

const DB_DIR: &str = "clipshelf";
const DB_FILE: &str = "clipshelf.db";
pub const DB_PATH_ENV: &str = "CLIPSHELF_DB";

pub const HISTORY_KEY: &str = "clipboard_history";
pub const SETTINGS_KEY: &str = "app_settings";
pub const MODIFIERS_KEY: &str = "hotkey_modifiers";

/// Flat string store. Every value this crate writes is a JSON document.
///
/// `revision` grows with every `set`, from any handle on the same storage, so
/// a long-running owner can notice writes made by another process.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> ClipResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> ClipResult<()>;
    fn revision(&self) -> ClipResult<u64>;
}

pub type DbPool = Pool<SqliteConnectionManager>;

pub struct SqliteStore {
    pool: DbPool,
}

pub fn default_db_path() -> PathBuf {
    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path.trim());
        }
    }
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(DB_DIR)
        .join(DB_FILE)
}

impl SqliteStore {
    pub fn open(path: &Path) -> ClipResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder().max_size(2).build(manager)?;
        let store = Self { pool };
        store.init_database()?;
        debug!(path = %path.display(), "opened key-value store");
        Ok(store)
    }

    /// Single-connection pool so every checkout sees the same in-memory database.
    pub fn in_memory() -> ClipResult<Self> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder().max_size(1).build(manager)?;
        let store = Self { pool };
        store.init_database()?;
        Ok(store)
    }

    fn init_database(&self) -> ClipResult<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                revision INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;
        ensure_kv_columns(&conn)?;
        Ok(())
    }
}

/// Databases written before the revision counter existed lack its column.
fn ensure_kv_columns(conn: &rusqlite::Connection) -> ClipResult<()> {
    let mut stmt = conn.prepare("PRAGMA table_info(kv)")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
    let mut columns = Vec::new();
    for row in rows {
        columns.push(row?);
    }

    if !columns.iter().any(|c| c == "revision") {
        conn.execute("ALTER TABLE kv ADD COLUMN revision INTEGER NOT NULL DEFAULT 0", [])?;
    }
    Ok(())
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> ClipResult<Option<String>> {
        let conn = self.pool.get()?;
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> ClipResult<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO kv (key, value, updated_at, revision)
             VALUES (?1, ?2, ?3, (SELECT COALESCE(MAX(revision), 0) + 1 FROM kv))
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at,
                revision = excluded.revision",
            params![key, value, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn revision(&self) -> ClipResult<u64> {
        let conn = self.pool.get()?;
        let revision: i64 =
            conn.query_row("SELECT COALESCE(MAX(revision), 0) FROM kv", [], |row| row.get(0))?;
        Ok(revision.max(0) as u64)
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    values: HashMap<String, String>,
    revision: u64,
}

/// In-process store. Clones share state, like two handles on one database file.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> ClipResult<std::sync::MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| ClipError::InvalidInput("memory store lock poisoned".to_string()))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> ClipResult<Option<String>> {
        Ok(self.lock()?.values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> ClipResult<()> {
        let mut state = self.lock()?;
        state.values.insert(key.to_string(), value.to_string());
        state.revision += 1;
        Ok(())
    }

    fn revision(&self) -> ClipResult<u64> {
        Ok(self.lock()?.revision)
    }
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for &T {
    fn get(&self, key: &str) -> ClipResult<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> ClipResult<()> {
        (**self).set(key, value)
    }

    fn revision(&self) -> ClipResult<u64> {
        (**self).revision()
    }
}

/// Missing keys and malformed values both come back as `None`.
fn load_json<T: DeserializeOwned>(store: &impl KeyValueStore, key: &str) -> Option<T> {
    let raw = match store.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(err) => {
            warn!(key, error = %err, "failed to read persisted value");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(key, error = %err, "ignoring malformed persisted value");
            None
        }
    }
}

pub fn load_history(store: &impl KeyValueStore) -> Vec<ClipboardEntry> {
    load_json(store, HISTORY_KEY).unwrap_or_default()
}

pub fn save_history(store: &impl KeyValueStore, entries: &[ClipboardEntry]) -> ClipResult<()> {
    let json = serde_json::to_string(entries)?;
    store.set(HISTORY_KEY, &json)
}

pub fn sanitize_settings(settings: &Settings) -> Settings {
    Settings {
        max_history_size: clamp_capacity(settings.max_history_size),
        font_size: settings.font_size.clamp(MIN_FONT_SIZE, MAX_FONT_SIZE),
        ..settings.clone()
    }
}

pub fn load_settings(store: &impl KeyValueStore) -> Settings {
    let settings: Settings = load_json(store, SETTINGS_KEY).unwrap_or_default();
    sanitize_settings(&settings)
}

pub fn save_settings(store: &impl KeyValueStore, settings: &Settings) -> ClipResult<Settings> {
    let settings = sanitize_settings(settings);
    let json = serde_json::to_string(&settings)?;
    store.set(SETTINGS_KEY, &json)?;
    Ok(settings)
}

pub fn load_modifiers(store: &impl KeyValueStore) -> HotkeyModifiers {
    load_json(store, MODIFIERS_KEY).unwrap_or_else(HotkeyModifiers::recommended)
}

pub fn save_modifiers(store: &impl KeyValueStore, modifiers: &HotkeyModifiers) -> ClipResult<()> {
    let json = serde_json::to_string(modifiers)?;
    store.set(MODIFIERS_KEY, &json)
}
