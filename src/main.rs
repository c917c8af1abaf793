use std::sync::Arc;

use actix_web::{App, HttpServer, web};
use dotenvy::dotenv;
use tokio::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use reftrack::affiliates::BackendFactory;
use reftrack::clicks::ClickManager;
use reftrack::clock::SystemClock;
use reftrack::config::Config;
use reftrack::services::{self, AppState, AppStartTime};
use reftrack::storage::StoreFactory;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let app_start_time = AppStartTime {
        start_datetime: chrono::Utc::now(),
    };

    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();

    let store = StoreFactory::create(&config.store)
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    let (backend, sink) = BackendFactory::create(&config.affiliates)
        .map_err(|e| std::io::Error::other(e.to_string()))?;

    let clicks = Arc::new(ClickManager::new(
        sink,
        Duration::from_secs(config.clicks.flush_interval_secs),
        config.clicks.flush_threshold,
    ));
    {
        let clicks = clicks.clone();
        tokio::spawn(async move {
            clicks.start_background_task().await;
        });
    }

    let state = web::Data::new(AppState {
        store,
        backend,
        clicks: clicks.clone(),
        clock: Arc::new(SystemClock),
        tracker_config: config.tracker.clone(),
    });
    let start_time = web::Data::new(app_start_time);

    info!(
        "Starting reftrack on {}:{} (store: {}, affiliates: {})",
        config.server.host, config.server.port, config.store.backend, config.affiliates.backend
    );

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .app_data(start_time.clone())
            .configure(services::routes)
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await?;

    // Drain buffered counters before exit.
    clicks.flush().await;
    Ok(())
}
