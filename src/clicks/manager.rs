use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use dashmap::DashMap;
use tokio::time::{Duration, sleep};
use tracing::{debug, warn};

use super::ClickSink;

/// Buffered click counter.
///
/// Increments land in an in-process buffer and are flushed to the sink
/// either by the periodic background task or immediately once the buffer
/// holds `flush_threshold` clicks. The buffer is owned by the manager,
/// not process-global, so independent managers can coexist in tests.
pub struct ClickManager {
    buffer: DashMap<String, usize>,
    buffered_total: AtomicUsize,
    flush_in_progress: AtomicBool,
    sink: Arc<dyn ClickSink>,
    flush_interval: Duration,
    flush_threshold: usize,
}

impl ClickManager {
    pub fn new(sink: Arc<dyn ClickSink>, flush_interval: Duration, flush_threshold: usize) -> Self {
        Self {
            buffer: DashMap::new(),
            buffered_total: AtomicUsize::new(0),
            flush_in_progress: AtomicBool::new(false),
            sink,
            flush_interval,
            flush_threshold,
        }
    }

    /// Record one click for `code`. Flushes inline when the threshold is
    /// reached; otherwise the background task picks the buffer up later.
    pub async fn increment(&self, code: &str) {
        *self.buffer.entry(code.to_string()).or_insert(0) += 1;
        let total = self.buffered_total.fetch_add(1, Ordering::Relaxed) + 1;

        if total >= self.flush_threshold {
            debug!("ClickManager: threshold reached ({} buffered)", total);
            self.flush_inner().await;
        }
    }

    /// Periodic flush loop, spawned once at startup.
    pub async fn start_background_task(&self) {
        loop {
            sleep(self.flush_interval).await;
            self.flush_inner().await;
        }
    }

    /// Manual flush, used on shutdown so buffered counts are not lost.
    pub async fn flush(&self) {
        debug!("ClickManager: manual flush triggered");
        self.flush_inner().await;
    }

    async fn flush_inner(&self) {
        if self.flush_in_progress.swap(true, Ordering::SeqCst) {
            debug!("ClickManager: flush already in progress, skipping");
            return;
        }

        let updates = {
            let updates = self
                .buffer
                .iter()
                .map(|entry| (entry.key().clone(), *entry.value()))
                .collect::<Vec<_>>();
            self.buffer.clear();
            self.buffered_total.store(0, Ordering::Relaxed);
            updates
        };

        if updates.is_empty() {
            self.flush_in_progress.store(false, Ordering::SeqCst);
            return;
        }

        debug!("ClickManager: flushing {} codes", updates.len());
        if let Err(e) = self.sink.flush_clicks(updates).await {
            // Lost batch only affects the denormalized counters.
            warn!("ClickManager: flush_clicks failed: {}", e);
        }

        self.flush_in_progress.store(false, Ordering::SeqCst);
    }
}
