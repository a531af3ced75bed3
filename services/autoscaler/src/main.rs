use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use autoscaler_service::Autoscaler;
use hpa_core::gateway::{KubeScaler, PrometheusGateway};
use hpa_core::{logging, start_health_server, AutoscalerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = AutoscalerConfig::from_env()?;
    logging::init_logging(Path::new(&cfg.log_dir))?;
    info!(target: "general", "log system activated");
    info!(target: "general", deployment = %cfg.deployment, namespace = %cfg.namespace, "starting autoscaler service");

    if cfg.health_port != 0 {
        start_health_server(cfg.health_port).await?;
    }

    let metrics = Arc::new(PrometheusGateway::new(&cfg.prometheus_ip));
    let scaler = Arc::new(KubeScaler::new(&cfg.kube_api_url, metrics.clone())?);
    let hpa = Autoscaler::new(cfg, metrics, scaler);
    hpa.run().await
}
