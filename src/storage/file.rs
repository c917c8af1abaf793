use std::collections::HashMap;
use std::fs;
use std::sync::RwLock;

use async_trait::async_trait;
use tracing::{error, info};

use super::KvStore;
use crate::errors::{RefTrackError, Result};

/// JSON-file backed store. The whole map is held in memory behind a
/// RwLock and rewritten on every mutation; attribution writes are rare
/// (one per captured referral), so the full rewrite is fine.
pub struct FileStore {
    file_path: String,
    cache: RwLock<HashMap<String, String>>,
}

impl FileStore {
    pub fn new(file_path: &str) -> Result<Self> {
        let store = FileStore {
            file_path: file_path.to_string(),
            cache: RwLock::new(HashMap::new()),
        };

        let entries = store.load_from_file()?;
        {
            let mut cache_guard = store.cache.write().unwrap();
            info!(
                "FileStore initialized, loaded {} entries from {}",
                entries.len(),
                store.file_path
            );
            *cache_guard = entries;
        }

        Ok(store)
    }

    fn load_from_file(&self) -> Result<HashMap<String, String>> {
        match fs::read_to_string(&self.file_path) {
            Ok(content) => match serde_json::from_str::<HashMap<String, String>>(&content) {
                Ok(entries) => Ok(entries),
                Err(e) => {
                    error!("Failed to parse store file {}: {}", self.file_path, e);
                    Err(RefTrackError::serialization(format!(
                        "failed to parse store file: {}",
                        e
                    )))
                }
            },
            Err(_) => {
                info!("Store file not found, creating empty store");
                if let Err(e) = fs::write(&self.file_path, "{}") {
                    error!("Failed to create store file {}: {}", self.file_path, e);
                    return Err(RefTrackError::file_operation(format!(
                        "failed to create store file: {}",
                        e
                    )));
                }
                Ok(HashMap::new())
            }
        }
    }

    fn save_to_file(&self, entries: &HashMap<String, String>) -> Result<()> {
        let json = serde_json::to_string_pretty(entries)?;
        fs::write(&self.file_path, json)?;
        Ok(())
    }
}

#[async_trait]
impl KvStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let cache_guard = self.cache.read().unwrap();
        Ok(cache_guard.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut cache_guard = self.cache.write().unwrap();
        cache_guard.insert(key.to_string(), value.to_string());
        self.save_to_file(&cache_guard)
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut cache_guard = self.cache.write().unwrap();
        if cache_guard.remove(key).is_none() {
            return Ok(());
        }
        self.save_to_file(&cache_guard)
    }

    fn backend_name(&self) -> &'static str {
        "file"
    }
}
