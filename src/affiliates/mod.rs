//! Affiliate backend interface
//!
//! The tracker treats the affiliate database as an opaque remote sink with
//! three capabilities: look up an active affiliate by referral code, append
//! a click record, and absorb aggregated counter increments (the latter
//! through [`crate::clicks::ClickSink`]). The backend owns affiliate
//! validity rules; an unknown or inactive code is simply "no affiliate".

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clicks::ClickSink;
use crate::config::AffiliateConfig;
use crate::errors::{RefTrackError, Result};

pub mod memory;
pub mod rest;

pub use memory::MemoryBackend;
pub use rest::RestBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AffiliateStatus {
    Active,
    Suspended,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Affiliate {
    pub id: Uuid,
    pub code: String,
    pub status: AffiliateStatus,
}

/// Append-only click record. `ip_address` is reserved: this component
/// never populates it, the backend may fill it in server-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickRecord {
    pub id: Uuid,
    pub affiliate_id: Uuid,
    pub user_agent: Option<String>,
    pub referer_url: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ClickRecord {
    pub fn new(affiliate_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            affiliate_id,
            user_agent: None,
            referer_url: None,
            ip_address: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_context(mut self, user_agent: Option<String>, referer_url: Option<String>) -> Self {
        self.user_agent = user_agent;
        self.referer_url = referer_url;
        self
    }
}

#[async_trait]
pub trait AffiliateBackend: Send + Sync {
    /// At most one affiliate per code; inactive affiliates are filtered
    /// out here, not by the caller.
    async fn find_active_affiliate(&self, code: &str) -> anyhow::Result<Option<Affiliate>>;

    async fn insert_click(&self, record: ClickRecord) -> anyhow::Result<()>;
}

pub struct BackendFactory;

impl BackendFactory {
    /// Both halves of the returned pair are the same backend instance:
    /// the lookup/insert interface and the counter sink.
    pub fn create(
        config: &AffiliateConfig,
    ) -> Result<(Arc<dyn AffiliateBackend>, Arc<dyn ClickSink>)> {
        match config.backend.as_str() {
            "rest" => {
                let api_url = config.api_url.as_deref().ok_or_else(|| {
                    RefTrackError::config("AFFILIATE_API_URL is required for the rest backend")
                })?;
                let backend = Arc::new(RestBackend::new(api_url, config.api_key.clone()));
                Ok((backend.clone(), backend))
            }
            _ => {
                let backend = Arc::new(MemoryBackend::new());
                Ok((backend.clone(), backend))
            }
        }
    }
}
