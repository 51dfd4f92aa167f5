//! `tracker`: attendance service binary entry point.
//!
//! Startup sequence:
//! 1. Load and validate [`Config`] from environment variables.
//! 2. Initialise the telemetry pipeline (tracing + optional OTLP).
//! 3. Initialise AWS SDK clients when a card key or photo bucket is configured.
//! 4. Resolve the card key and build the [`CardCodec`].
//! 5. Build the repositories and the attendance service.
//! 6. Spawn the connectivity probe.
//! 7. Build the Axum router and serve until SIGINT/SIGTERM.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::signal;
use tracing::info;

use tracker::attendance::{AttendanceService, Settings};
use tracker::aws::AwsClients;
use tracker::config::Config;
use tracker::connectivity::{self, ConnectivityMonitor};
use tracker::crypto::CardCodec;
use tracker::server::{self, AppState};
use tracker::store::{MemoryPhotoStore, MemoryStore, PhotoStore, S3PhotoStore, Stores};
use tracker::{card_key, telemetry};

#[tokio::main]
async fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let cfg = Config::from_env().map_err(|e| {
        // Telemetry is not yet up; write to stderr directly.
        eprintln!("ERROR: configuration invalid: {e:#}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    telemetry::init_telemetry(cfg.otel_exporter_otlp_endpoint.as_deref(), &cfg.log_level)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = cfg.listen_port,
        identifier_field = %cfg.identifier_field,
        "tracker starting"
    );

    // -----------------------------------------------------------------------
    // 3. AWS clients
    // -----------------------------------------------------------------------
    let aws = if AwsClients::required(&cfg) {
        Some(AwsClients::init(&cfg).await?)
    } else {
        None
    };

    // -----------------------------------------------------------------------
    // 4. Card codec
    // -----------------------------------------------------------------------
    let key = card_key::load(aws.as_ref(), &cfg).await?;
    let codec = CardCodec::new(key, cfg.card_format, cfg.card_random_iv);
    info!(
        card_format = cfg.card_format.as_str(),
        random_iv = cfg.card_random_iv,
        "card codec ready"
    );

    // -----------------------------------------------------------------------
    // 5. Repositories and service
    // -----------------------------------------------------------------------
    let photos: Arc<dyn PhotoStore> = match (&cfg.photo_bucket, &aws) {
        (Some(bucket), Some(aws)) => Arc::new(S3PhotoStore::new(
            aws.s3.clone(),
            bucket.clone(),
            Duration::from_secs(cfg.photo_url_ttl_secs),
        )),
        _ => Arc::new(MemoryPhotoStore::new()),
    };
    let stores = Stores::from_memory(MemoryStore::new(&cfg.identifier_field), photos);
    let monitor = ConnectivityMonitor::new();
    let service = AttendanceService::new(stores.clone(), monitor.clone(), Settings::from_config(&cfg));

    // -----------------------------------------------------------------------
    // 6. Background tasks
    // -----------------------------------------------------------------------
    let _probe = connectivity::probe_task(
        stores,
        monitor,
        Duration::from_secs(cfg.connectivity_probe_interval_secs),
    );

    // -----------------------------------------------------------------------
    // 7. HTTP server
    // -----------------------------------------------------------------------
    let router = server::router::build(AppState::new(service, codec));

    let addr: std::net::SocketAddr = ([0, 0, 0, 0], cfg.listen_port).into();
    info!(addr = %addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("tracker stopped");
    telemetry::shutdown();
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        info!("received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                info!("received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
