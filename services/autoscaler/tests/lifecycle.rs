//! End-to-end loop lifecycle against scripted gateways: the schedulers fire,
//! a scale decision lands, and stopping the tasks stops the ticking.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use autoscaler_service::Autoscaler;
use hpa_core::gateway::{MetricsGateway, Sample, ScalerGateway};
use hpa_core::{AutoscalerConfig, HpaError};

#[derive(Default)]
struct ScriptedMetrics {
    cpu: Mutex<VecDeque<f64>>,
}

#[async_trait]
impl MetricsGateway for ScriptedMetrics {
    async fn point(&self, query: &str, _period: u64) -> Result<f64, HpaError> {
        if query.contains("container_cpu_usage") {
            Ok(self.cpu.lock().pop_front().unwrap_or(0.0))
        } else {
            Ok(0.0)
        }
    }

    async fn range_since(
        &self,
        _query: &str,
        _start: DateTime<Utc>,
        _period: u64,
    ) -> Result<Vec<Sample>, HpaError> {
        Ok(Vec::new())
    }

    async fn window(&self, _query: &str, _period: u64, _n: u64) -> Result<Vec<Sample>, HpaError> {
        Ok(Vec::new())
    }
}

struct RecordingScaler {
    replicas: Mutex<u32>,
    calls: Mutex<Vec<u32>>,
}

#[async_trait]
impl ScalerGateway for RecordingScaler {
    async fn replicas(
        &self,
        _namespace: &str,
        _deployment: &str,
        _period: u64,
    ) -> Result<u32, HpaError> {
        Ok((*self.replicas.lock()).max(1))
    }

    async fn scale_to(
        &self,
        _namespace: &str,
        _deployment: &str,
        replicas: u32,
    ) -> Result<(), HpaError> {
        self.calls.lock().push(replicas);
        *self.replicas.lock() = replicas;
        Ok(())
    }
}

fn cfg() -> AutoscalerConfig {
    AutoscalerConfig {
        namespace: "prod".into(),
        deployment: "web".into(),
        container: "app".into(),
        app_name: "shop".into(),
        target_cpu_utilization: 75.0,
        min_replicas: 1,
        max_replicas: 15,
        metric_period: 1,
        prometheus_ip: "http://prometheus:9090".into(),
        kube_api_url: "https://kubernetes.default.svc".into(),
        log_dir: "./log".into(),
        health_port: 0,
    }
}

#[tokio::test]
async fn loops_tick_and_stop() {
    let metrics = Arc::new(ScriptedMetrics::default());
    metrics.cpu.lock().push_back(150.0);
    let scaler = Arc::new(RecordingScaler { replicas: Mutex::new(1), calls: Mutex::new(Vec::new()) });

    let hpa = Autoscaler::new(cfg(), metrics.clone(), scaler.clone());
    let tasks = hpa.clone().start();
    assert_eq!(tasks.len(), 3);

    // first ticks fire immediately: 1 replica at 150% of a 75% target -> 2
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(scaler.calls.lock().as_slice(), &[2]);
    assert_eq!(hpa.state().current_cdt(), 1);

    for task in &tasks {
        task.stop();
    }
    for task in tasks {
        task.join().await;
    }

    // nothing ticks after shutdown
    metrics.cpu.lock().push_back(300.0);
    tokio::time::sleep(Duration::from_millis(1200)).await;
    assert_eq!(scaler.calls.lock().as_slice(), &[2]);
}
