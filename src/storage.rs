#[cfg(test)]
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::domain::{CompletedTask, Task};

pub const CURRENT_TASK_KEY: &str = "timer_current_task";
pub const COMPLETED_TASKS_KEY: &str = "timer_completed_tasks";
/// Reserved for a last-tick marker; nothing reads or writes it yet.
#[allow(dead_code)]
pub const LAST_TICK_KEY: &str = "timer_last_tick";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error on {key}: {source}")]
    Io {
        key: String,
        source: std::io::Error,
    },
    #[error("failed to encode {key}: {source}")]
    Encode {
        key: String,
        source: serde_json::Error,
    },
}

/// Durable string values addressed by key.
pub trait KeyValueStore {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn save(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
}

/// One `<key>.json` file per key inside a state directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(raw) => Ok(Some(raw)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }

    fn save(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        let io_err = |source| StorageError::Io {
            key: key.to_string(),
            source,
        };

        fs::create_dir_all(&self.dir).map_err(io_err)?;
        let path = self.path_for(key);
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, value).map_err(io_err)?;
        fs::rename(&staging, &path).map_err(io_err)
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }
}

#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

#[cfg(test)]
impl KeyValueStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.values.get(key).cloned())
    }

    fn save(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.values.remove(key);
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistedState {
    pub current_task: Option<Task>,
    pub completed_tasks: Vec<CompletedTask>,
}

/// Reads both keys. Anything unreadable falls back to the empty value so a
/// damaged record never blocks startup.
pub fn load_state(store: &dyn KeyValueStore) -> PersistedState {
    PersistedState {
        current_task: load_or_default::<Option<Task>>(store, CURRENT_TASK_KEY),
        completed_tasks: load_or_default::<Vec<CompletedTask>>(store, COMPLETED_TASKS_KEY),
    }
}

/// Writes both keys, archive first, so a stopped task is on disk before its
/// active record goes away. An absent active task removes its key. Each key
/// is attempted even when the other fails; the first error is returned.
pub fn save_state(store: &mut dyn KeyValueStore, state: &PersistedState) -> Result<(), StorageError> {
    let archived = encode(COMPLETED_TASKS_KEY, &state.completed_tasks)
        .and_then(|raw| store.save(COMPLETED_TASKS_KEY, &raw));

    let active = match &state.current_task {
        Some(task) => {
            encode(CURRENT_TASK_KEY, task).and_then(|raw| store.save(CURRENT_TASK_KEY, &raw))
        }
        None => store.remove(CURRENT_TASK_KEY),
    };

    match (archived, active) {
        (Err(first), Err(second)) => {
            tracing::warn!(key = CURRENT_TASK_KEY, error = %second, "failed to write stored value");
            Err(first)
        }
        (archived, active) => archived.and(active),
    }
}

fn encode<T: serde::Serialize>(key: &str, value: &T) -> Result<String, StorageError> {
    serde_json::to_string(value).map_err(|source| StorageError::Encode {
        key: key.to_string(),
        source,
    })
}

fn load_or_default<T: DeserializeOwned + Default>(store: &dyn KeyValueStore, key: &str) -> T {
    let raw = match store.load(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return T::default(),
        Err(err) => {
            tracing::warn!(key, error = %err, "failed to read stored value, using default");
            return T::default();
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(key, error = %err, "failed to decode stored value, using default");
            T::default()
        }
    }
}
