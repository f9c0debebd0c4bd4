// Option store: typed key/value settings backing every deploy decision
//
// Nothing above this layer caches option values; every operation re-reads
// the store, so implementations must tolerate unset keys.

use crate::errors::StoreError;
use crate::models::OptionKey;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, instrument};

/// Key/value configuration store
///
/// `get` returns `None` for keys that are unset or hold only whitespace.
#[async_trait]
pub trait OptionStore: Send + Sync {
    async fn get(&self, key: OptionKey) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: OptionKey, value: String) -> Result<(), StoreError>;

    async fn delete(&self, key: OptionKey) -> Result<(), StoreError>;

    /// All non-empty values currently stored
    async fn all(&self) -> Result<BTreeMap<OptionKey, String>, StoreError> {
        let mut values = BTreeMap::new();
        for key in OptionKey::ALL {
            if let Some(value) = self.get(key).await? {
                values.insert(key, value);
            }
        }
        Ok(values)
    }
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty()).cloned()
}

/// In-memory store, used by tests and ephemeral deployments
#[derive(Debug, Default)]
pub struct InMemoryOptionStore {
    values: RwLock<HashMap<OptionKey, String>>,
}

impl InMemoryOptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated with the given values
    pub fn with_values<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (OptionKey, V)>,
        V: Into<String>,
    {
        let values = values.into_iter().map(|(k, v)| (k, v.into())).collect();
        Self {
            values: RwLock::new(values),
        }
    }
}

#[async_trait]
impl OptionStore for InMemoryOptionStore {
    async fn get(&self, key: OptionKey) -> Result<Option<String>, StoreError> {
        Ok(non_empty(self.values.read().await.get(&key)))
    }

    async fn set(&self, key: OptionKey, value: String) -> Result<(), StoreError> {
        self.values.write().await.insert(key, value);
        Ok(())
    }

    async fn delete(&self, key: OptionKey) -> Result<(), StoreError> {
        self.values.write().await.remove(&key);
        Ok(())
    }
}

/// Store backed by a JSON object on disk
///
/// The file is read on every access so edits made outside the process are
/// picked up. Writes go through a temp file and a rename.
#[derive(Debug)]
pub struct FileOptionStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileOptionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_document(&self) -> Result<BTreeMap<String, String>, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(BTreeMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_document(&self, document: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(document)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl OptionStore for FileOptionStore {
    async fn get(&self, key: OptionKey) -> Result<Option<String>, StoreError> {
        let document = self.read_document().await?;
        Ok(non_empty(document.get(key.as_str())))
    }

    #[instrument(skip(self, value), fields(path = %self.path.display()))]
    async fn set(&self, key: OptionKey, value: String) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.read_document().await?;
        document.insert(key.as_str().to_string(), value);
        self.write_document(&document).await?;
        debug!(key = %key, "Option written");
        Ok(())
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn delete(&self, key: OptionKey) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.read_document().await?;
        if document.remove(key.as_str()).is_some() {
            self.write_document(&document).await?;
            debug!(key = %key, "Option deleted");
        }
        Ok(())
    }
}
