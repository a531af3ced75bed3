//! Gateway abstractions over the metric store and the cluster orchestrator.
//!
//! The control loops only ever see these traits; production wiring injects
//! the Prometheus and Kubernetes implementations, tests inject scripted
//! fakes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::HpaError;

mod kube;
mod prometheus;
pub mod queries;

pub use kube::KubeScaler;
pub use prometheus::PrometheusGateway;

/// One scraped sample: unix timestamp (seconds) and value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub unix: f64,
    pub value: f64,
}

#[async_trait]
pub trait MetricsGateway: Send + Sync {
    /// Most recent value of `query` over the trailing `period` seconds,
    /// evaluated at step `period`. 0.0 when the result set is empty.
    async fn point(&self, query: &str, period: u64) -> Result<f64, HpaError>;

    /// Values of `query` from `start` to now at step `period`. The first
    /// returned sample spans the range boundary; callers drop it.
    async fn range_since(
        &self,
        query: &str,
        start: DateTime<Utc>,
        period: u64,
    ) -> Result<Vec<Sample>, HpaError>;

    /// The last `n` steps of `period` seconds each.
    async fn window(&self, query: &str, period: u64, n: u64) -> Result<Vec<Sample>, HpaError>;
}

#[async_trait]
pub trait ScalerGateway: Send + Sync {
    /// Observed replica count. A scrape of 0 is clamped to 1 so downstream
    /// arithmetic never collapses.
    async fn replicas(&self, namespace: &str, deployment: &str, period: u64)
        -> Result<u32, HpaError>;

    /// Apply `max(1, replicas)` to the workload's scale subresource.
    async fn scale_to(&self, namespace: &str, deployment: &str, replicas: u32)
        -> Result<(), HpaError>;
}
