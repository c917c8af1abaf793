use std::sync::Mutex;

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use super::{Affiliate, AffiliateBackend, AffiliateStatus, ClickRecord};
use crate::clicks::ClickSink;

/// In-memory affiliate backend for tests and local development: a code
/// index, an append-only click log, and the denormalized counters.
#[derive(Default)]
pub struct MemoryBackend {
    affiliates: DashMap<String, Affiliate>,
    clicks: Mutex<Vec<ClickRecord>>,
    counters: DashMap<String, usize>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, code: &str, status: AffiliateStatus) -> Affiliate {
        let affiliate = Affiliate {
            id: Uuid::new_v4(),
            code: code.to_string(),
            status,
        };
        self.affiliates.insert(code.to_string(), affiliate.clone());
        affiliate
    }

    pub fn clicks(&self) -> Vec<ClickRecord> {
        self.clicks.lock().unwrap().clone()
    }

    pub fn counter(&self, code: &str) -> usize {
        self.counters.get(code).map(|entry| *entry.value()).unwrap_or(0)
    }
}

#[async_trait]
impl AffiliateBackend for MemoryBackend {
    async fn find_active_affiliate(&self, code: &str) -> anyhow::Result<Option<Affiliate>> {
        Ok(self
            .affiliates
            .get(code)
            .filter(|entry| entry.status == AffiliateStatus::Active)
            .map(|entry| entry.value().clone()))
    }

    async fn insert_click(&self, record: ClickRecord) -> anyhow::Result<()> {
        self.clicks.lock().unwrap().push(record);
        Ok(())
    }
}

#[async_trait]
impl ClickSink for MemoryBackend {
    async fn flush_clicks(&self, updates: Vec<(String, usize)>) -> anyhow::Result<()> {
        for (code, count) in updates {
            *self.counters.entry(code).or_insert(0) += count;
        }
        Ok(())
    }
}
