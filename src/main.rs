use std::path::Path;
use std::sync::Arc;

use egauge_api::{routes, Config, EnergyService, MeterClient};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,egauge_api=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    info!("Starting egauge-api v{}", env!("CARGO_PKG_VERSION"));

    let config_path =
        std::env::var("APP_CONFIG").unwrap_or_else(|_| "config/config.yaml".to_string());
    let config = if Path::new(&config_path).is_file() {
        info!("Loading configuration from {}", config_path);
        Config::load(&config_path)?
    } else {
        info!("No configuration file at {}, using environment", config_path);
        Config::from_env()?
    };
    info!(
        meter = %config.meter.name,
        host = %config.meter.host,
        tariff = config.tariff.rate_per_kwh,
        "Configuration loaded"
    );

    let meter = Arc::new(MeterClient::new(&config.meter)?);
    let service = EnergyService::from_config(&config, meter);

    let allowed_origins = config.api.allowed_origins();
    info!(origins = ?allowed_origins, "CORS origins");
    let app = routes::create_router(service, &allowed_origins);

    let addr = config.api.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", addr, e))?;
    info!("API server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Application shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C, or on SIGTERM from the container runtime.
async fn shutdown_signal() {
    let source = tokio::select! {
        result = signal::ctrl_c() => match result {
            Ok(()) => "ctrl-c",
            Err(e) => {
                warn!(error = %e, "Ctrl+C handler unavailable");
                std::future::pending::<&'static str>().await
            }
        },
        _ = terminate() => "SIGTERM",
    };

    info!(signal = source, "Shutting down, draining in-flight requests");
}

#[cfg(unix)]
async fn terminate() {
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            warn!(error = %e, "SIGTERM handler unavailable");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
