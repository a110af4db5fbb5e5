use std::error::Error;
use std::fmt;
use std::path::Path;

use rusqlite::Connection;
use uuid::Uuid;

use crate::db;

/// Durable key-value storage shared between execution contexts.
pub trait Storage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    /// Keys written by other contexts since the previous call.
    fn take_changes(&mut self) -> Result<Vec<String>, StorageError>;
}

#[derive(Debug)]
pub enum StorageError {
    Io(std::io::Error),
    Db(rusqlite::Error),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Io(err) => write!(f, "storage I/O error: {}", err),
            StorageError::Db(err) => write!(f, "storage database error: {}", err),
        }
    }
}

impl Error for StorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            StorageError::Io(err) => Some(err),
            StorageError::Db(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(value: std::io::Error) -> Self {
        StorageError::Io(value)
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(value: rusqlite::Error) -> Self {
        StorageError::Db(value)
    }
}

/// SQLite-backed storage. Each instance is its own context: writes are
/// stamped with a context id so other instances can tell them apart.
pub struct SqliteStorage {
    conn: Connection,
    context_id: String,
    seen_revision: i64,
}

impl SqliteStorage {
    pub fn open(path: &str) -> Result<Self, StorageError> {
        ensure_parent_dir(path)?;
        let conn = db::open_connection(path)?;
        let seen_revision = db::max_revision(&conn)?;
        Ok(Self {
            conn,
            context_id: Uuid::now_v7().to_string(),
            seen_revision,
        })
    }

    #[cfg(test)]
    pub fn context_id(&self) -> &str {
        &self.context_id
    }
}

impl Storage for SqliteStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(db::get_value(&self.conn, key)?)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        db::put_value(&self.conn, key, value, &self.context_id)?;
        Ok(())
    }

    fn take_changes(&mut self) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        for change in db::changes_since(&self.conn, self.seen_revision)? {
            self.seen_revision = self.seen_revision.max(change.revision);
            if change.writer != self.context_id && !keys.contains(&change.key) {
                keys.push(change.key);
            }
        }
        Ok(keys)
    }
}

fn ensure_parent_dir(path: &str) -> Result<(), std::io::Error> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[cfg(test)]
pub mod memory {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use super::{Storage, StorageError};

    #[derive(Default)]
    struct Shared {
        values: HashMap<String, String>,
        // (key, writer context) in write order
        log: Vec<(String, usize)>,
        next_context: usize,
    }

    /// In-process storage; `share` opens another context on the same data.
    pub struct MemoryStorage {
        shared: Arc<Mutex<Shared>>,
        context: usize,
        cursor: usize,
    }

    impl MemoryStorage {
        pub fn new() -> Self {
            Self {
                shared: Arc::new(Mutex::new(Shared {
                    next_context: 1,
                    ..Shared::default()
                })),
                context: 0,
                cursor: 0,
            }
        }

        pub fn share(&self) -> Self {
            let mut shared = self.shared.lock().expect("memory storage lock");
            let context = shared.next_context;
            shared.next_context += 1;
            let cursor = shared.log.len();
            drop(shared);
            Self {
                shared: Arc::clone(&self.shared),
                context,
                cursor,
            }
        }

        pub fn raw_set(&self, key: &str, value: &str) {
            let mut shared = self.shared.lock().expect("memory storage lock");
            shared.values.insert(key.to_string(), value.to_string());
            shared.log.push((key.to_string(), usize::MAX));
        }
    }

    impl Storage for MemoryStorage {
        fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            let shared = self.shared.lock().expect("memory storage lock");
            Ok(shared.values.get(key).cloned())
        }

        fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
            let mut shared = self.shared.lock().expect("memory storage lock");
            shared.values.insert(key.to_string(), value.to_string());
            shared.log.push((key.to_string(), self.context));
            Ok(())
        }

        fn take_changes(&mut self) -> Result<Vec<String>, StorageError> {
            let shared = self.shared.lock().expect("memory storage lock");
            let mut keys = Vec::new();
            for (key, writer) in &shared.log[self.cursor..] {
                if *writer != self.context && !keys.contains(key) {
                    keys.push(key.clone());
                }
            }
            self.cursor = shared.log.len();
            Ok(keys)
        }
    }
}
