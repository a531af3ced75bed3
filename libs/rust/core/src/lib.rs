//! Core library for the adaptive horizontal autoscaler.
//!
//! Holds the control algorithms (online ARIMA forecaster, threshold and
//! stabilization-window coordinators), the gateway abstractions over the
//! metric store and the orchestrator, the periodic scheduler, and the shared
//! service plumbing (configuration, logging, health endpoint).

use axum::{routing::get, Router};
use std::net::SocketAddr;
use tracing::info;

pub mod arima;
pub mod config;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod scheduler;
pub mod stabilization;
pub mod threshold;

pub use arima::OnlineArima;
pub use config::AutoscalerConfig;
pub use error::HpaError;
pub use scheduler::{PeriodicScheduler, PeriodicTask};
pub use stabilization::{StabilizationWindowCoordinator, Trend};
pub use threshold::ThresholdCoordinator;

pub async fn start_health_server(port: u16) -> Result<(), HpaError> {
    let app = Router::new().route("/healthz", get(|| async { "ok" }));
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| HpaError::Config(format!("health server bind: {e}")))?;
    info!(?addr, "Health server listening");
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error=?e, "Health server failed");
        }
    });
    Ok(())
}
