use std::sync::Arc;

use dotenv::dotenv;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clinic_scheduler::ClinicEngine;
use notification_cell::TracingNotifier;
use shared_config::AppConfig;
use shared_database::InMemoryDatabase;
use shared_utils::SystemClock;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting clinic scheduler");

    let config = AppConfig::from_env();
    if config.clinic_offset().is_none() {
        anyhow::bail!(
            "CLINIC_UTC_OFFSET_MINUTES={} is not a valid UTC offset",
            config.clinic_utc_offset_minutes
        );
    }
    info!(
        "Clinic offset {} min, reminders every {}s, cancellation notice {}h",
        config.clinic_utc_offset_minutes,
        config.reminder_interval_seconds,
        config.min_cancellation_notice_hours
    );

    let engine = ClinicEngine::start(
        &config,
        InMemoryDatabase::new(),
        Arc::new(TracingNotifier),
        Arc::new(SystemClock),
    );

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Could not listen for ctrl-c, shutting down: {}", e);
    }
    info!("Shutdown signal received");

    engine.shutdown().await;
    Ok(())
}
