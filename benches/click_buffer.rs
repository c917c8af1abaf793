//! Click buffer benchmarks

use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};
use tokio::runtime::Runtime;
use tokio::time::Duration;

use reftrack::clicks::{ClickManager, ClickSink};

/// Sink that discards everything; only increment cost is measured.
struct NoopSink;

#[async_trait::async_trait]
impl ClickSink for NoopSink {
    async fn flush_clicks(&self, _updates: Vec<(String, usize)>) -> anyhow::Result<()> {
        Ok(())
    }
}

fn create_manager() -> ClickManager {
    ClickManager::new(
        Arc::new(NoopSink) as Arc<dyn ClickSink>,
        Duration::from_secs(3600), // long interval, no periodic flush
        usize::MAX,                // high threshold, no inline flush
    )
}

fn bench_increment_hot_key(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let manager = create_manager();

    c.bench_function("increment/hot_key", |b| {
        b.to_async(&rt).iter(|| async {
            manager.increment("hot_key").await;
        });
    });
}

fn bench_increment_spread_keys(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let manager = create_manager();
    let keys: Vec<String> = (0..1000).map(|i| format!("code_{}", i)).collect();
    let mut idx = 0;

    c.bench_function("increment/spread_keys", |b| {
        b.to_async(&rt).iter(|| {
            let key = keys[idx % keys.len()].clone();
            idx += 1;
            let manager = &manager;
            async move {
                manager.increment(&key).await;
            }
        });
    });
}

fn bench_flush_small_buffer(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let manager = create_manager();

    c.bench_function("flush/small_buffer", |b| {
        b.to_async(&rt).iter(|| async {
            for i in 0..16 {
                manager.increment(&format!("code_{}", i)).await;
            }
            manager.flush().await;
        });
    });
}

criterion_group!(
    benches,
    bench_increment_hot_key,
    bench_increment_spread_keys,
    bench_flush_small_buffer
);
criterion_main!(benches);
