use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;

use crate::db::{self, repository, DatabaseError};

/// Durable key-value storage backing the catalog.
pub trait CatalogStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<String>, DatabaseError>;
    fn save(&self, key: &str, value: &str) -> Result<(), DatabaseError>;
}

// ---------------------------------------------------------------------------
// SQLite
// ---------------------------------------------------------------------------

/// Catalog store on the local SQLite database (`kv_store` table).
pub struct SqliteCatalogStore {
    conn: Mutex<Connection>,
}

impl SqliteCatalogStore {
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        let conn = db::open_database(path)?;
        tracing::debug!(path = %path.display(), "Catalog database opened");
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Ok(Self::from_connection(db::open_memory_database()?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // A panic mid-statement leaves SQLite itself consistent
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CatalogStore for SqliteCatalogStore {
    fn load(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        repository::get_value(&self.conn(), key)
    }

    fn save(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        repository::set_value(&self.conn(), key, value)
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// Non-durable store for tests and dry runs.
#[derive(Default)]
pub struct MemoryCatalogStore {
    values: Mutex<HashMap<String, String>>,
    read_only: AtomicBool,
}

impl MemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with one value.
    pub fn with_value(key: &str, value: &str) -> Self {
        let store = Self::default();
        store.values().insert(key.to_string(), value.to_string());
        store
    }

    /// Make every subsequent `save` fail.
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    fn values(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.values.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CatalogStore for MemoryCatalogStore {
    fn load(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        Ok(self.values().get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        if self.read_only.load(Ordering::SeqCst) {
            return Err(DatabaseError::Unavailable("store is read-only".into()));
        }
        self.values().insert(key.to_string(), value.to_string());
        Ok(())
    }
}
