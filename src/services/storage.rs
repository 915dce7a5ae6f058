use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

pub const TOKEN_KEY: &str = "token";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
pub const LAST_TOKEN_REFRESH_KEY: &str = "lastTokenRefresh";

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Errors that can occur when persisting the token store
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage file is corrupt: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A change made through one storage handle, observed by the others
#[derive(Debug, Clone, PartialEq)]
pub struct StorageEvent {
    pub key: String,
    pub new_value: Option<String>,
    origin: Uuid,
}

struct Shared {
    entries: Mutex<HashMap<String, String>>,
    path: Option<PathBuf>,
    events: broadcast::Sender<StorageEvent>,
}

/// Key/value token store shared between client instances
///
/// Every handle returned by [`LocalStorage::open_tab`] sees the same entries;
/// subscribers only observe changes made through *other* handles, the way a
/// browser delivers `storage` events to every tab except the writer.
#[derive(Clone)]
pub struct LocalStorage {
    shared: Arc<Shared>,
    origin: Uuid,
}

impl LocalStorage {
    pub fn in_memory() -> Self {
        Self::with_entries(HashMap::new(), None)
    }

    /// Open a file-backed store, loading existing entries if the file exists
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let entries = match std::fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => HashMap::new(),
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!("Opened token storage at {} ({} entries)", path.display(), entries.len());
        Ok(Self::with_entries(entries, Some(path)))
    }

    fn with_entries(entries: HashMap<String, String>, path: Option<PathBuf>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                entries: Mutex::new(entries),
                path,
                events,
            }),
            origin: Uuid::new_v4(),
        }
    }

    /// Another handle over the same entries with its own event origin
    pub fn open_tab(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            origin: Uuid::new_v4(),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries().get(key).cloned()
    }

    pub fn set(&self, key: &str, value: impl Into<String>) -> Result<(), StorageError> {
        let value = value.into();
        {
            let mut entries = self.entries();
            if entries.get(key) == Some(&value) {
                return Ok(());
            }
            let mut next = entries.clone();
            next.insert(key.to_string(), value.clone());
            self.persist(&next)?;
            *entries = next;
        }
        self.notify(key, Some(value));
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<(), StorageError> {
        {
            let mut entries = self.entries();
            if !entries.contains_key(key) {
                return Ok(());
            }
            let mut next = entries.clone();
            next.remove(key);
            self.persist(&next)?;
            *entries = next;
        }
        self.notify(key, None);
        Ok(())
    }

    pub fn subscribe(&self) -> StorageEvents {
        StorageEvents {
            rx: self.shared.events.subscribe(),
            origin: self.origin,
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.shared
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Entries only change in memory once they are on disk
    fn persist(&self, entries: &HashMap<String, String>) -> Result<(), StorageError> {
        if let Some(path) = &self.shared.path {
            let json = serde_json::to_string_pretty(entries)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn notify(&self, key: &str, new_value: Option<String>) {
        // No receivers is fine: nobody is watching.
        let _ = self.shared.events.send(StorageEvent {
            key: key.to_string(),
            new_value,
            origin: self.origin,
        });
    }
}

impl std::fmt::Debug for LocalStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStorage")
            .field("path", &self.shared.path)
            .field("origin", &self.origin)
            .finish()
    }
}

/// Stream of storage changes made by other handles
pub struct StorageEvents {
    rx: broadcast::Receiver<StorageEvent>,
    origin: Uuid,
}

impl StorageEvents {
    pub async fn recv(&mut self) -> Option<StorageEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if event.origin == self.origin => continue,
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Storage watcher lagged, skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
