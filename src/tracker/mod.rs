//! Referral attribution state machine
//!
//! Owns the lifecycle of a visitor's referral code: capture from an
//! inbound URL, persistence with an expiry window, lazy expiry on read,
//! and explicit clearing once a conversion consumes the attribution.
//! Click reporting is detached and never observed by page flow.
//!
//! At most one attribution is active per visitor. A fresh URL-borne code
//! always overwrites (last-touch from a link); visits without a URL code
//! keep whatever is stored (sticky across regular browsing).

pub mod attribution;

use std::sync::{Arc, RwLock};

use tracing::{debug, warn};

use crate::affiliates::{AffiliateBackend, ClickRecord};
use crate::clicks::ClickManager;
use crate::clock::Clock;
use crate::config::TrackerConfig;
use crate::storage::KvStore;
use crate::utils::split_referral;

pub use attribution::{REFERRAL_CODE_KEY, REFERRAL_EXPIRES_KEY, StoredAttribution};

/// One inbound page load, as seen by the tracker.
#[derive(Debug, Clone)]
pub struct PageView {
    pub url: String,
    pub user_agent: Option<String>,
    pub referer: Option<String>,
}

impl PageView {
    pub fn new<T: Into<String>>(url: T) -> Self {
        Self {
            url: url.into(),
            user_agent: None,
            referer: None,
        }
    }

    pub fn with_user_agent<T: Into<String>>(mut self, user_agent: T) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_referer<T: Into<String>>(mut self, referer: T) -> Self {
        self.referer = Some(referer.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InitOutcome {
    /// A code arrived on the URL and was persisted with a fresh window.
    /// `cleaned_url` is the same URL with the referral parameter removed.
    Captured { code: String, cleaned_url: String },
    /// No URL code; a stored, still-active attribution was restored.
    Restored { code: String },
    /// A stored attribution had expired and was purged.
    Expired,
    /// Nothing stored, nothing on the URL.
    NoAttribution,
}

impl InitOutcome {
    pub fn code(&self) -> Option<&str> {
        match self {
            InitOutcome::Captured { code, .. } | InitOutcome::Restored { code } => Some(code),
            _ => None,
        }
    }
}

pub struct ReferralTracker {
    store: Arc<dyn KvStore>,
    backend: Arc<dyn AffiliateBackend>,
    clicks: Arc<ClickManager>,
    clock: Arc<dyn Clock>,
    config: TrackerConfig,
    /// Single-writer in-memory state: written only by `handle_page_load`
    /// and `clear`, read by `active_code`. The expiry is cached alongside
    /// the code so the memory path also honors the window.
    current: RwLock<Option<StoredAttribution>>,
}

impl ReferralTracker {
    pub fn new(
        store: Arc<dyn KvStore>,
        backend: Arc<dyn AffiliateBackend>,
        clicks: Arc<ClickManager>,
        clock: Arc<dyn Clock>,
        config: TrackerConfig,
    ) -> Self {
        Self {
            store,
            backend,
            clicks,
            clock,
            config,
            current: RwLock::new(None),
        }
    }

    /// Run the detection algorithm for one page load.
    ///
    /// A URL-borne code unconditionally overwrites any stored attribution
    /// and fires a detached click report. Without a URL code the stored
    /// attribution is restored, backfilled (legacy entries), or purged
    /// (expired entries). Store failures degrade to "no attribution";
    /// nothing here ever propagates an error to the page flow.
    pub async fn handle_page_load(&self, view: &PageView) -> InitOutcome {
        if let Some(split) = split_referral(&view.url, &self.config.referral_param) {
            let expires_at = self.clock.now() + self.config.window();
            self.persist(&split.code, expires_at).await;
            *self.current.write().unwrap() = Some(StoredAttribution {
                code: split.code.clone(),
                expires_at: Some(expires_at),
            });
            self.spawn_click_report(split.code.clone(), view);
            return InitOutcome::Captured {
                code: split.code,
                cleaned_url: split.cleaned_url,
            };
        }

        match self.read_stored().await {
            Some(stored) if stored.needs_backfill() => {
                debug!("Backfilling expiry for legacy attribution: {}", stored.code);
                let expires_at = self.clock.now() + self.config.window();
                self.persist(&stored.code, expires_at).await;
                *self.current.write().unwrap() = Some(StoredAttribution {
                    code: stored.code.clone(),
                    expires_at: Some(expires_at),
                });
                InitOutcome::Restored { code: stored.code }
            }
            Some(stored) if stored.is_active(self.clock.now()) => {
                // Reads never extend the window.
                *self.current.write().unwrap() = Some(stored.clone());
                InitOutcome::Restored { code: stored.code }
            }
            Some(stored) => {
                debug!("Purging expired attribution: {}", stored.code);
                self.purge().await;
                *self.current.write().unwrap() = None;
                InitOutcome::Expired
            }
            None => {
                *self.current.write().unwrap() = None;
                InitOutcome::NoAttribution
            }
        }
    }

    /// In-memory attribution if still active, otherwise a fresh store
    /// read. Covers consumers that ask before `handle_page_load` has run.
    /// An expired entry found on either path is purged, not just ignored.
    pub async fn active_code(&self) -> Option<String> {
        let cached = self.current.read().unwrap().clone();
        if let Some(attribution) = cached {
            if attribution.is_active(self.clock.now()) {
                return Some(attribution.code);
            }
            // Window lapsed since the code was cached.
            self.purge().await;
            *self.current.write().unwrap() = None;
            return None;
        }

        match self.read_stored().await {
            Some(stored) if stored.is_active(self.clock.now()) => Some(stored.code),
            Some(_) => {
                self.purge().await;
                None
            }
            None => None,
        }
    }

    /// Drop the attribution after a conversion has consumed it, so the
    /// same code is not reapplied to a later unrelated conversion.
    pub async fn clear(&self) {
        self.purge().await;
        *self.current.write().unwrap() = None;
    }

    async fn persist(&self, code: &str, expires_at: chrono::DateTime<chrono::Utc>) {
        if let Err(e) = self.store.set(REFERRAL_CODE_KEY, code).await {
            warn!("Failed to persist referral code: {}", e);
            return;
        }
        if let Err(e) = self
            .store
            .set(REFERRAL_EXPIRES_KEY, &attribution::format_expiry(expires_at))
            .await
        {
            warn!("Failed to persist referral expiry: {}", e);
        }
    }

    async fn read_stored(&self) -> Option<StoredAttribution> {
        let code = match self.store.get(REFERRAL_CODE_KEY).await {
            Ok(Some(code)) if !code.is_empty() => code,
            Ok(_) => return None,
            Err(e) => {
                warn!("Failed to read stored referral code: {}", e);
                return None;
            }
        };

        let expires_at = match self.store.get(REFERRAL_EXPIRES_KEY).await {
            Ok(Some(raw)) => {
                let parsed = attribution::parse_expiry(&raw);
                if parsed.is_none() {
                    warn!("Unparseable referral expiry {:?}, treating as legacy", raw);
                }
                parsed
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Failed to read referral expiry: {}", e);
                None
            }
        };

        Some(StoredAttribution { code, expires_at })
    }

    async fn purge(&self) {
        if let Err(e) = self.store.remove(REFERRAL_CODE_KEY).await {
            warn!("Failed to remove referral code: {}", e);
        }
        if let Err(e) = self.store.remove(REFERRAL_EXPIRES_KEY).await {
            warn!("Failed to remove referral expiry: {}", e);
        }
    }

    fn spawn_click_report(&self, code: String, view: &PageView) {
        let backend = self.backend.clone();
        let clicks = self.clicks.clone();
        let user_agent = view.user_agent.clone();
        let referer = view.referer.clone();
        tokio::spawn(async move {
            report_click(backend, clicks, code, user_agent, referer).await;
        });
    }
}

/// Fire-and-forget click report: affiliate lookup, click-log insert,
/// counter increment. Lookup misses are silent; failures are logged and
/// swallowed. The insert and the counter are independent, a failure in
/// one does not skip the other. No retries; lost clicks only degrade
/// attribution accuracy.
pub async fn report_click(
    backend: Arc<dyn AffiliateBackend>,
    clicks: Arc<ClickManager>,
    code: String,
    user_agent: Option<String>,
    referer_url: Option<String>,
) {
    let affiliate = match backend.find_active_affiliate(&code).await {
        Ok(Some(affiliate)) => affiliate,
        Ok(None) => {
            debug!("No active affiliate for referral code: {}", code);
            return;
        }
        Err(e) => {
            warn!("Affiliate lookup failed for {}: {}", code, e);
            return;
        }
    };

    let record = ClickRecord::new(affiliate.id).with_context(user_agent, referer_url);
    if let Err(e) = backend.insert_click(record).await {
        warn!("Click insert failed for {}: {}", code, e);
    }

    clicks.increment(&code).await;
}
