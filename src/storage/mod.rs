//! Visitor-side persistent key-value store
//!
//! The tracker persists at most two string entries per visitor (referral
//! code and expiry timestamp). Backends are deliberately dumb string KV
//! stores; all attribution semantics live in the tracker.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::StoreConfig;
use crate::errors::Result;

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    /// Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;
    fn backend_name(&self) -> &'static str;
}

/// View of a shared [`KvStore`] namespaced to a single visitor.
///
/// Keys are prefixed with the visitor id, so one shared backend serves
/// every visitor while each tracker instance only ever sees its own two
/// attribution entries.
pub struct ScopedStore {
    inner: Arc<dyn KvStore>,
    prefix: String,
}

impl ScopedStore {
    pub fn new(inner: Arc<dyn KvStore>, visitor_id: &str) -> Self {
        Self {
            inner,
            prefix: format!("{}:", visitor_id),
        }
    }

    fn scoped(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

#[async_trait]
impl KvStore for ScopedStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(&self.scoped(key)).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.inner.set(&self.scoped(key), value).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.inner.remove(&self.scoped(key)).await
    }

    fn backend_name(&self) -> &'static str {
        self.inner.backend_name()
    }
}

pub struct StoreFactory;

impl StoreFactory {
    pub fn create(config: &StoreConfig) -> Result<Arc<dyn KvStore>> {
        let store: Arc<dyn KvStore> = match config.backend.as_str() {
            "file" => Arc::new(FileStore::new(&config.file_path)?),
            _ => Arc::new(MemoryStore::new()),
        };
        Ok(store)
    }
}
