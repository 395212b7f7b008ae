use anyhow::Result;
use std::time::Duration;
use tokio::{net::TcpListener, signal, time};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use home_monitor_service::{
    api::{self, AppState},
    config::Config,
    db,
    hue::HueClient,
    ingest::IngestService,
    measurements::MeasurementRepo,
    reading_cache::ReadingCache,
    readings::ReadingRepo,
};

/// Retention sweep cadence.
const RETENTION_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env (ignore error if file absent — env vars may be set externally)
    let _ = dotenvy::dotenv();

    // Initialise tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    // Load config
    let config = Config::from_env()?;

    // Connect to DB and run migrations
    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;
    info!("Database ready");

    let readings = ReadingRepo::new(pool.clone());
    let measurements = MeasurementRepo::new(pool);

    // Shared in-memory cache of latest readings per device
    let cache = ReadingCache::new();

    // Shared Hue client
    let hue = HueClient::new(&config);

    // Spawn the polling ingest loop
    {
        let ingest = IngestService::new(
            hue,
            readings.clone(),
            measurements.clone(),
            cache.clone(),
        );
        let interval = Duration::from_secs(config.poll_interval_secs);

        tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            info!(interval_secs = interval.as_secs(), "Ingest polling loop started");

            loop {
                ticker.tick().await;
                if let Err(e) = ingest.run_cycle().await {
                    tracing::error!(error = %e, "Ingest cycle failed");
                }
            }
        });
    }

    // Spawn the retention loop
    {
        let readings = readings.clone();
        let days = config.retention_days;

        tokio::spawn(async move {
            let mut ticker = time::interval(RETENTION_INTERVAL);
            info!(retention_days = days, "Retention loop started");

            loop {
                ticker.tick().await;
                match readings.delete_old_readings(days).await {
                    Ok(deleted) => info!(deleted, "Retention sweep complete"),
                    Err(e) => tracing::error!(error = %e, "Retention sweep failed"),
                }
            }
        });
    }

    // Start HTTP server
    let state = AppState {
        readings,
        measurements,
        cache,
    };
    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, "HTTP server listening");

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
