//! Referral tracker lifecycle tests
//!
//! The core contract: capture from URL, restore within the window,
//! lazy expiry, legacy backfill, overwrite-on-new-code, clear, and
//! click-report isolation.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use tokio::time::Duration;

use reftrack::affiliates::{
    Affiliate, AffiliateBackend, AffiliateStatus, ClickRecord, MemoryBackend,
};
use reftrack::clicks::ClickManager;
use reftrack::clock::{Clock, ManualClock};
use reftrack::config::TrackerConfig;
use reftrack::storage::{KvStore, MemoryStore};
use reftrack::tracker::{
    InitOutcome, PageView, REFERRAL_CODE_KEY, REFERRAL_EXPIRES_KEY, ReferralTracker, report_click,
};

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

struct TestEnv {
    tracker: ReferralTracker,
    store: Arc<MemoryStore>,
    backend: Arc<MemoryBackend>,
    clicks: Arc<ClickManager>,
    clock: Arc<ManualClock>,
}

fn test_env() -> TestEnv {
    let store = Arc::new(MemoryStore::new());
    let backend = Arc::new(MemoryBackend::new());
    // Threshold 1 so every increment flushes straight to the backend.
    let clicks = Arc::new(ClickManager::new(
        backend.clone(),
        Duration::from_secs(3600),
        1,
    ));
    let clock = Arc::new(ManualClock::new(base_time()));

    let tracker = ReferralTracker::new(
        store.clone(),
        backend.clone(),
        clicks.clone(),
        clock.clone(),
        TrackerConfig::default(),
    );

    TestEnv {
        tracker,
        store,
        backend,
        clicks,
        clock,
    }
}

async fn stored_code(store: &MemoryStore) -> Option<String> {
    store.get(REFERRAL_CODE_KEY).await.unwrap()
}

async fn stored_expiry(store: &MemoryStore) -> Option<String> {
    store.get(REFERRAL_EXPIRES_KEY).await.unwrap()
}

#[tokio::test]
async fn capture_from_url_persists_code_and_expiry() {
    let env = test_env();

    let outcome = env
        .tracker
        .handle_page_load(&PageView::new("https://shop.example.com/?ref=ABC123"))
        .await;

    match outcome {
        InitOutcome::Captured { ref code, .. } => assert_eq!(code, "ABC123"),
        other => panic!("expected capture, got {:?}", other),
    }
    assert_eq!(outcome.code(), Some("ABC123"));
    assert_eq!(env.tracker.active_code().await, Some("ABC123".to_string()));
    assert_eq!(stored_code(&env.store).await, Some("ABC123".to_string()));

    let expiry = stored_expiry(&env.store).await.unwrap();
    let expires_at = DateTime::parse_from_rfc3339(&expiry)
        .unwrap()
        .with_timezone(&Utc);
    assert_eq!(expires_at, base_time() + chrono::Duration::days(30));
}

#[tokio::test]
async fn capture_strips_param_and_keeps_others() {
    let env = test_env();

    let outcome = env
        .tracker
        .handle_page_load(&PageView::new(
            "https://shop.example.com/products?utm_source=mail&ref=ABC123&page=2",
        ))
        .await;

    match outcome {
        InitOutcome::Captured { cleaned_url, .. } => {
            assert!(!cleaned_url.contains("ref="));
            assert!(cleaned_url.contains("utm_source=mail"));
            assert!(cleaned_url.contains("page=2"));
        }
        other => panic!("expected capture, got {:?}", other),
    }
}

#[tokio::test]
async fn restore_within_window_leaves_expiry_untouched() {
    let env = test_env();
    env.tracker
        .handle_page_load(&PageView::new("https://shop.example.com/?ref=KEEP"))
        .await;
    let expiry_before = stored_expiry(&env.store).await.unwrap();

    // 20 days later, still 10 days inside the window, no URL code.
    env.clock.advance(chrono::Duration::days(20));
    let outcome = env
        .tracker
        .handle_page_load(&PageView::new("https://shop.example.com/"))
        .await;

    assert_eq!(
        outcome,
        InitOutcome::Restored {
            code: "KEEP".to_string()
        }
    );
    assert_eq!(stored_expiry(&env.store).await.unwrap(), expiry_before);
}

#[tokio::test]
async fn expired_attribution_is_purged() {
    let env = test_env();
    env.tracker
        .handle_page_load(&PageView::new("https://shop.example.com/?ref=STALE"))
        .await;

    env.clock.advance(chrono::Duration::days(31));
    let outcome = env
        .tracker
        .handle_page_load(&PageView::new("https://shop.example.com/"))
        .await;

    assert_eq!(outcome, InitOutcome::Expired);
    assert_eq!(stored_code(&env.store).await, None);
    assert_eq!(stored_expiry(&env.store).await, None);
    assert_eq!(env.tracker.active_code().await, None);
}

#[tokio::test]
async fn expired_code_is_not_served_from_memory_after_page_load() {
    let env = test_env();
    env.tracker
        .handle_page_load(&PageView::new("https://shop.example.com/?ref=STALE"))
        .await;
    assert_eq!(env.tracker.active_code().await, Some("STALE".to_string()));

    env.clock.advance(chrono::Duration::days(31));
    let outcome = env
        .tracker
        .handle_page_load(&PageView::new("https://shop.example.com/"))
        .await;

    // The purge must cover the cached code too, not just the store.
    assert_eq!(outcome, InitOutcome::Expired);
    assert_eq!(env.tracker.active_code().await, None);
}

#[tokio::test]
async fn active_code_expires_without_an_intervening_page_load() {
    let env = test_env();
    env.tracker
        .handle_page_load(&PageView::new("https://shop.example.com/?ref=STALE"))
        .await;

    // No further page load: the window lapses while the code sits in
    // memory. Serving it anyway would leak an inactive attribution.
    env.clock.advance(chrono::Duration::days(31));

    assert_eq!(env.tracker.active_code().await, None);
    assert_eq!(stored_code(&env.store).await, None);
    assert_eq!(stored_expiry(&env.store).await, None);
}

#[tokio::test]
async fn active_code_purges_expired_entry_on_fallback_read() {
    let env = test_env();
    env.store.set(REFERRAL_CODE_KEY, "STALE").await.unwrap();
    env.store
        .set(
            REFERRAL_EXPIRES_KEY,
            &(base_time() - chrono::Duration::days(1)).to_rfc3339(),
        )
        .await
        .unwrap();

    assert_eq!(env.tracker.active_code().await, None);
    assert_eq!(stored_code(&env.store).await, None);
    assert_eq!(stored_expiry(&env.store).await, None);
}

#[tokio::test]
async fn legacy_entry_without_expiry_is_backfilled() {
    let env = test_env();
    env.store.set(REFERRAL_CODE_KEY, "LEGACY").await.unwrap();

    let outcome = env
        .tracker
        .handle_page_load(&PageView::new("https://shop.example.com/"))
        .await;

    assert_eq!(
        outcome,
        InitOutcome::Restored {
            code: "LEGACY".to_string()
        }
    );
    assert_eq!(env.tracker.active_code().await, Some("LEGACY".to_string()));

    let expiry = stored_expiry(&env.store).await.unwrap();
    let expires_at = DateTime::parse_from_rfc3339(&expiry)
        .unwrap()
        .with_timezone(&Utc);
    assert_eq!(expires_at, base_time() + chrono::Duration::days(30));
}

#[tokio::test]
async fn malformed_expiry_is_treated_as_legacy() {
    let env = test_env();
    env.store.set(REFERRAL_CODE_KEY, "ODD").await.unwrap();
    env.store.set(REFERRAL_EXPIRES_KEY, "soon").await.unwrap();

    let outcome = env
        .tracker
        .handle_page_load(&PageView::new("https://shop.example.com/"))
        .await;

    assert_eq!(
        outcome,
        InitOutcome::Restored {
            code: "ODD".to_string()
        }
    );
    // Backfilled with a parseable expiry.
    let expiry = stored_expiry(&env.store).await.unwrap();
    assert!(DateTime::parse_from_rfc3339(&expiry).is_ok());
}

#[tokio::test]
async fn fresh_url_code_overwrites_active_attribution() {
    let env = test_env();
    env.tracker
        .handle_page_load(&PageView::new("https://shop.example.com/?ref=OLD"))
        .await;

    // 10 days in, OLD still has 20 days left; a new link wins anyway.
    env.clock.advance(chrono::Duration::days(10));
    let outcome = env
        .tracker
        .handle_page_load(&PageView::new("https://shop.example.com/?ref=NEW"))
        .await;

    match outcome {
        InitOutcome::Captured { ref code, .. } => assert_eq!(code, "NEW"),
        other => panic!("expected capture, got {:?}", other),
    }
    assert_eq!(stored_code(&env.store).await, Some("NEW".to_string()));

    let expiry = stored_expiry(&env.store).await.unwrap();
    let expires_at = DateTime::parse_from_rfc3339(&expiry)
        .unwrap()
        .with_timezone(&Utc);
    assert_eq!(expires_at, env.clock.now() + chrono::Duration::days(30));
}

#[tokio::test]
async fn clear_purges_store_and_memory() {
    let env = test_env();
    env.tracker
        .handle_page_load(&PageView::new("https://shop.example.com/?ref=DONE"))
        .await;

    env.tracker.clear().await;

    assert_eq!(env.tracker.active_code().await, None);
    assert_eq!(stored_code(&env.store).await, None);
    assert_eq!(stored_expiry(&env.store).await, None);
}

#[tokio::test]
async fn visit_without_url_code_and_empty_store_is_noop() {
    let env = test_env();
    let outcome = env
        .tracker
        .handle_page_load(&PageView::new("https://shop.example.com/"))
        .await;

    assert_eq!(outcome, InitOutcome::NoAttribution);
    assert_eq!(env.tracker.active_code().await, None);
}

#[tokio::test]
async fn click_report_records_click_and_counter() {
    let env = test_env();
    env.backend.register("PARTNER", AffiliateStatus::Active);

    report_click(
        env.backend.clone(),
        env.clicks.clone(),
        "PARTNER".to_string(),
        Some("Mozilla/5.0".to_string()),
        Some("https://blog.example.com/post".to_string()),
    )
    .await;

    let clicks = env.backend.clicks();
    assert_eq!(clicks.len(), 1);
    assert_eq!(clicks[0].user_agent.as_deref(), Some("Mozilla/5.0"));
    assert_eq!(
        clicks[0].referer_url.as_deref(),
        Some("https://blog.example.com/post")
    );
    // Reserved, never populated by this component.
    assert_eq!(clicks[0].ip_address, None);
    assert_eq!(env.backend.counter("PARTNER"), 1);
}

#[tokio::test]
async fn click_report_ignores_unknown_and_suspended_codes() {
    let env = test_env();
    env.backend.register("PAUSED", AffiliateStatus::Suspended);

    report_click(
        env.backend.clone(),
        env.clicks.clone(),
        "PAUSED".to_string(),
        None,
        None,
    )
    .await;
    report_click(
        env.backend.clone(),
        env.clicks.clone(),
        "NOBODY".to_string(),
        None,
        None,
    )
    .await;

    assert!(env.backend.clicks().is_empty());
    assert_eq!(env.backend.counter("PAUSED"), 0);
    assert_eq!(env.backend.counter("NOBODY"), 0);
}

#[tokio::test]
async fn capture_reports_click_in_background() {
    let env = test_env();
    env.backend.register("ASYNC", AffiliateStatus::Active);

    env.tracker
        .handle_page_load(
            &PageView::new("https://shop.example.com/?ref=ASYNC").with_user_agent("test-agent"),
        )
        .await;

    // The report is detached; give it a moment to land.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let clicks = env.backend.clicks();
    assert_eq!(clicks.len(), 1);
    assert_eq!(clicks[0].user_agent.as_deref(), Some("test-agent"));
    assert_eq!(env.backend.counter("ASYNC"), 1);
}

/// Backend whose lookup always fails.
struct FailingBackend;

#[async_trait::async_trait]
impl AffiliateBackend for FailingBackend {
    async fn find_active_affiliate(&self, _code: &str) -> anyhow::Result<Option<Affiliate>> {
        anyhow::bail!("lookup unavailable")
    }

    async fn insert_click(&self, _record: ClickRecord) -> anyhow::Result<()> {
        anyhow::bail!("insert unavailable")
    }
}

#[tokio::test]
async fn capture_succeeds_when_click_reporting_fails() {
    let store = Arc::new(MemoryStore::new());
    let backend = Arc::new(FailingBackend);
    let sink = Arc::new(MemoryBackend::new());
    let clicks = Arc::new(ClickManager::new(sink, Duration::from_secs(3600), 1));
    let clock = Arc::new(ManualClock::new(base_time()));
    let tracker = ReferralTracker::new(
        store.clone(),
        backend.clone(),
        clicks.clone(),
        clock,
        TrackerConfig::default(),
    );

    let outcome = tracker
        .handle_page_load(&PageView::new("https://shop.example.com/?ref=ABC123"))
        .await;

    match outcome {
        InitOutcome::Captured { ref code, .. } => assert_eq!(code, "ABC123"),
        other => panic!("expected capture, got {:?}", other),
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Attribution survives the failed report.
    assert_eq!(tracker.active_code().await, Some("ABC123".to_string()));
    assert_eq!(
        store.get(REFERRAL_CODE_KEY).await.unwrap(),
        Some("ABC123".to_string())
    );

    // A direct report against the failing backend must swallow the error.
    report_click(backend, clicks, "ABC123".to_string(), None, None).await;
}

/// Backend where the click insert fails but lookup succeeds; the counter
/// increment is independent and must still happen.
struct InsertFailBackend {
    inner: MemoryBackend,
}

#[async_trait::async_trait]
impl AffiliateBackend for InsertFailBackend {
    async fn find_active_affiliate(&self, code: &str) -> anyhow::Result<Option<Affiliate>> {
        self.inner.find_active_affiliate(code).await
    }

    async fn insert_click(&self, _record: ClickRecord) -> anyhow::Result<()> {
        anyhow::bail!("click log down")
    }
}

#[tokio::test]
async fn counter_increments_even_when_click_insert_fails() {
    let inner = MemoryBackend::new();
    inner.register("PARTNER", AffiliateStatus::Active);
    let backend = Arc::new(InsertFailBackend { inner });

    let sink = Arc::new(MemoryBackend::new());
    let clicks = Arc::new(ClickManager::new(sink.clone(), Duration::from_secs(3600), 1));

    report_click(backend, clicks, "PARTNER".to_string(), None, None).await;

    assert_eq!(sink.counter("PARTNER"), 1);
}
