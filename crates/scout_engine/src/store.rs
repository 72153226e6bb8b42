//! Durable key-value state shared by every component of the worker.
//!
//! The store is the only source of truth for flags and checkpoints: values
//! are re-read from the backend on every access, never cached.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use scout_core::{Category, LastOpened, Progress, ScrapeError, ScraperFlags};
use scout_logging::{scout_debug, scout_warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::persist::{ensure_state_dir, AtomicFileWriter, PersistError};

pub type Document = Map<String, Value>;

const STATE_FILENAME: &str = "scout_state.json";
const CORRUPT_SUFFIX: &str = "corrupt";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKey {
    ScraperFlags,
    DeviceId,
    CurrentCategory,
    Progress,
    LastOpened,
    ScrapeErrors,
    SiteValue,
}

impl StoreKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKey::ScraperFlags => "scraperFlags",
            StoreKey::DeviceId => "deviceId",
            StoreKey::CurrentCategory => "currentCategory",
            StoreKey::Progress => "progress",
            StoreKey::LastOpened => "lastOpened",
            StoreKey::ScrapeErrors => "scrapeErrors",
            StoreKey::SiteValue => "siteValue",
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
}

/// Backend holding the state document.
pub trait Store: Send + Sync {
    fn read(&self) -> Result<Document, StoreError>;

    /// Read-modify-write of the whole document, serialized against other
    /// writers of the same store.
    fn modify(&self, apply: &mut dyn FnMut(&mut Document)) -> Result<(), StoreError>;
}

/// JSON document on disk, replaced atomically on every write.
///
/// A document that no longer parses is moved to `scout_state.json.corrupt`
/// and the store starts over empty.
#[derive(Debug)]
pub struct FileStore {
    writer: AtomicFileWriter,
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        ensure_state_dir(dir)?;
        Ok(Self {
            writer: AtomicFileWriter::new(dir, STATE_FILENAME),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        self.writer.target()
    }

    fn load(&self) -> Result<Document, StoreError> {
        let content = match fs::read_to_string(self.path()) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Document::new()),
            Err(err) => return Err(err.into()),
        };
        let err = match serde_json::from_str::<Document>(&content) {
            Ok(doc) => return Ok(doc),
            Err(err) => err,
        };
        match self.writer.move_aside(CORRUPT_SUFFIX)? {
            Some(backup) => scout_warn!(
                "Failed to parse state document {:?}, moved to {:?}, starting empty: {}",
                self.path(),
                backup,
                err
            ),
            // Another reader already moved it.
            None => scout_debug!("Corrupt state document already moved aside"),
        }
        Ok(Document::new())
    }
}

impl Store for FileStore {
    fn read(&self) -> Result<Document, StoreError> {
        self.load()
    }

    fn modify(&self, apply: &mut dyn FnMut(&mut Document)) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut doc = self.load()?;
        apply(&mut doc);
        let content = serde_json::to_vec_pretty(&doc)?;
        self.writer.write(&content)?;
        Ok(())
    }
}

/// In-process store, used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    doc: Mutex<Document>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn read(&self) -> Result<Document, StoreError> {
        Ok(self.doc.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn modify(&self, apply: &mut dyn FnMut(&mut Document)) -> Result<(), StoreError> {
        let mut doc = self.doc.lock().unwrap_or_else(PoisonError::into_inner);
        apply(&mut doc);
        Ok(())
    }
}

/// Typed access to the persisted keys.
#[derive(Clone)]
pub struct DurableState {
    store: Arc<dyn Store>,
}

impl DurableState {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub fn get<T: DeserializeOwned>(&self, key: StoreKey) -> Result<Option<T>, StoreError> {
        let mut doc = self.store.read()?;
        match doc.remove(key.as_str()) {
            Some(Value::Null) | None => Ok(None),
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
        }
    }

    pub fn put<T: Serialize>(&self, key: StoreKey, value: &T) -> Result<(), StoreError> {
        let value = serde_json::to_value(value)?;
        self.store.modify(&mut |doc| {
            doc.insert(key.as_str().to_string(), value.clone());
        })
    }

    pub fn remove(&self, keys: &[StoreKey]) -> Result<(), StoreError> {
        self.store.modify(&mut |doc| {
            for key in keys {
                doc.remove(key.as_str());
            }
        })
    }

    /// Atomic read-modify-write of one key. Returning `None` deletes the key.
    pub fn modify<T, F>(&self, key: StoreKey, f: F) -> Result<Option<T>, StoreError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(Option<T>) -> Option<T>,
    {
        let mut f = Some(f);
        let mut outcome: Result<Option<T>, StoreError> = Ok(None);
        self.store.modify(&mut |doc| {
            let Some(f) = f.take() else {
                return;
            };
            let current = match doc.get(key.as_str()) {
                Some(Value::Null) | None => None,
                Some(value) => match serde_json::from_value::<T>(value.clone()) {
                    Ok(parsed) => Some(parsed),
                    Err(err) => {
                        outcome = Err(err.into());
                        return;
                    }
                },
            };
            outcome = match f(current) {
                Some(next) => match serde_json::to_value(&next) {
                    Ok(value) => {
                        doc.insert(key.as_str().to_string(), value);
                        Ok(Some(next))
                    }
                    Err(err) => Err(err.into()),
                },
                None => {
                    doc.remove(key.as_str());
                    Ok(None)
                }
            };
        })?;
        outcome
    }

    /// Missing flags read as running.
    pub fn flags(&self) -> Result<ScraperFlags, StoreError> {
        Ok(self.get(StoreKey::ScraperFlags)?.unwrap_or_default())
    }

    pub fn set_flags(&self, flags: ScraperFlags) -> Result<(), StoreError> {
        self.put(StoreKey::ScraperFlags, &flags)
    }

    pub fn set_paused(&self, paused: bool) -> Result<ScraperFlags, StoreError> {
        let flags = self.modify(StoreKey::ScraperFlags, |flags: Option<ScraperFlags>| {
            let mut flags = flags.unwrap_or_default();
            flags.is_paused = paused;
            Some(flags)
        })?;
        Ok(flags.unwrap_or_default())
    }

    pub fn device_id(&self) -> Result<Option<String>, StoreError> {
        self.get(StoreKey::DeviceId)
    }

    pub fn current_category(&self) -> Result<Option<Category>, StoreError> {
        self.get(StoreKey::CurrentCategory)
    }

    pub fn set_current_category(&self, category: &Category) -> Result<(), StoreError> {
        self.put(StoreKey::CurrentCategory, category)
    }

    pub fn progress(&self) -> Result<Option<Progress>, StoreError> {
        self.get(StoreKey::Progress)
    }

    pub fn last_opened(&self) -> Result<Option<LastOpened>, StoreError> {
        self.get(StoreKey::LastOpened)
    }

    pub fn set_last_opened(&self, last_opened: &LastOpened) -> Result<(), StoreError> {
        self.put(StoreKey::LastOpened, last_opened)
    }

    pub fn scrape_errors(&self) -> Result<Vec<ScrapeError>, StoreError> {
        Ok(self.get(StoreKey::ScrapeErrors)?.unwrap_or_default())
    }

    pub fn site(&self) -> Result<Option<String>, StoreError> {
        self.get(StoreKey::SiteValue)
    }

    pub fn set_site(&self, site: &str) -> Result<(), StoreError> {
        self.put(StoreKey::SiteValue, &site)
    }
}
