/// Destination for aggregated click counts.
///
/// `updates` carries one entry per referral code with the number of
/// clicks buffered since the previous flush. A sink failure loses that
/// batch; the click log remains authoritative, so the counters only
/// drift, they never corrupt.
#[async_trait::async_trait]
pub trait ClickSink: Send + Sync {
    async fn flush_clicks(&self, updates: Vec<(String, usize)>) -> anyhow::Result<()>;
}
