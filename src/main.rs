//! GridPass smart charging service.
//! Negotiates charging plans and books capacity-reserved sessions.
//! Reads configuration from TOML file (~/.config/gridpass-charging/config.toml).

use std::sync::Arc;

use chrono::Duration;
use tracing::{error, info};

use gridpass_charging::application::booking::ReservationManager;
use gridpass_charging::application::capacity::{start_slot_expiry_task, CapacityLedger};
use gridpass_charging::application::catalog::StationCatalog;
use gridpass_charging::application::negotiator::Negotiator;
use gridpass_charging::application::planner::PlanBuilder;
use gridpass_charging::application::tariffs::TariffBook;
use gridpass_charging::config::{default_config_path, AppConfig};
use gridpass_charging::infrastructure::{load_demo_data, DemoAuthenticator, LocalPlanAnchor};
use gridpass_charging::shared::shutdown::ShutdownCoordinator;
use gridpass_charging::{create_api_router, create_event_bus};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Load configuration ─────────────────────────────────────
    let config_path = std::env::var("GRIDPASS_CONFIG")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| default_config_path());
    let app_cfg = match AppConfig::load(&config_path) {
        Ok(cfg) => {
            init_tracing(&cfg);
            info!("Configuration loaded from {}", config_path.display());
            cfg
        }
        Err(e) => {
            let cfg = AppConfig::default();
            init_tracing(&cfg);
            error!("Failed to load config: {}. Using defaults.", e);
            cfg
        }
    };

    info!("Starting GridPass Smart Charging service...");

    // ── Prometheus metrics recorder ────────────────────────────
    let prometheus_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    info!("📊 Prometheus metrics recorder installed");

    // ── Core engine state ──────────────────────────────────────
    let builder = PlanBuilder::new(app_cfg.planner_config());
    let catalog = StationCatalog::shared();
    let tariffs = TariffBook::shared();
    let ledger = Arc::new(CapacityLedger::new(
        builder.clock(),
        app_cfg.ledger.default_site_limit_kw,
    ));
    load_demo_data(&catalog, &tariffs, &ledger);

    let negotiator = Negotiator::shared(
        catalog.clone(),
        tariffs.clone(),
        ledger.clone(),
        builder,
        app_cfg.negotiator_config(),
    );

    let event_bus = create_event_bus();
    info!("🔔 Event bus initialized for real-time notifications");

    let reservation_manager = Arc::new(ReservationManager::new(
        catalog.clone(),
        ledger.clone(),
        Arc::new(DemoAuthenticator::new()),
        Arc::new(LocalPlanAnchor::new()),
        event_bus.clone(),
        app_cfg.booking_config(),
    ));

    // ── Shutdown coordination + background tasks ───────────────
    let shutdown = ShutdownCoordinator::new();
    let shutdown_signal = shutdown.signal();
    shutdown.start_signal_listener();

    start_slot_expiry_task(
        ledger,
        shutdown_signal.clone(),
        app_cfg.ledger.prune_interval_secs,
        Duration::hours(app_cfg.ledger.retention_hours),
    );

    // ── REST API server ────────────────────────────────────────
    let api_router = create_api_router(
        negotiator,
        reservation_manager,
        catalog,
        event_bus,
        prometheus_handle,
    );

    let api_addr = app_cfg.server.address();
    let listener = tokio::net::TcpListener::bind(&api_addr).await?;
    info!("REST API server listening on http://{}", api_addr);
    info!("Swagger UI available at http://{}/docs/", api_addr);

    info!("🚀 Server started. Press Ctrl+C to shutdown gracefully.");

    axum::serve(listener, api_router)
        .with_graceful_shutdown(async move {
            shutdown_signal.wait().await;
            info!("🛑 REST API server received shutdown signal");
        })
        .await?;

    info!("👋 GridPass Smart Charging shutdown complete");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .init();
}
