//! The autoscaler controller: three periodic loops around shared control
//! state.
//!
//! - scaling loop: classic utilization/target rule, cool-down gated
//!   scale-down
//! - threshold loop: request volatility rewrites the CPU target
//! - stabilization loop: request trend widens or narrows the cool-down
//!
//! Every shared field carries its own guard so the loops make independent
//! progress; no loop ever holds two guards at once, and no guard is held
//! across an await.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{error, info};

use hpa_core::arima::OnlineArima;
use hpa_core::config::AutoscalerConfig;
use hpa_core::error::HpaError;
use hpa_core::gateway::{queries, MetricsGateway, ScalerGateway};
use hpa_core::scheduler::{PeriodicScheduler, PeriodicTask};
use hpa_core::stabilization::{StabilizationWindowCoordinator, Trend};
use hpa_core::threshold::ThresholdCoordinator;

const MIN_CDT: u32 = 1;
const MAX_CDT: u32 = 60;
const FORECAST_HISTORY: usize = 10;
const LEARNING_RATE: f64 = 0.1;
const EPSILON: f64 = 1e-4;
const RNG_SEED: u64 = 42;

/// Control fields shared by the three loops.
pub struct ControlState {
    target_cpu: Mutex<f64>,
    current_cdt: Mutex<u32>,
    desired_cdt: Mutex<u32>,
    start_time: Mutex<Option<DateTime<Utc>>>,
    active: AtomicBool,
    // locked by the threshold loop only
    forecaster: Mutex<OnlineArima>,
}

impl ControlState {
    fn new(initial_target: f64) -> Self {
        Self {
            target_cpu: Mutex::new(initial_target),
            current_cdt: Mutex::new(0),
            desired_cdt: Mutex::new(MIN_CDT),
            start_time: Mutex::new(None),
            active: AtomicBool::new(false),
            forecaster: Mutex::new(OnlineArima::seeded(
                FORECAST_HISTORY,
                LEARNING_RATE,
                EPSILON,
                RNG_SEED,
            )),
        }
    }

    pub fn target_cpu(&self) -> f64 {
        *self.target_cpu.lock()
    }

    pub fn current_cdt(&self) -> u32 {
        *self.current_cdt.lock()
    }

    pub fn desired_cdt(&self) -> u32 {
        *self.desired_cdt.lock()
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        *self.start_time.lock()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

pub struct Autoscaler {
    cfg: AutoscalerConfig,
    metrics: Arc<dyn MetricsGateway>,
    scaler: Arc<dyn ScalerGateway>,
    threshold: ThresholdCoordinator,
    stabilization: StabilizationWindowCoordinator,
    state: ControlState,
}

impl Autoscaler {
    pub fn new(
        cfg: AutoscalerConfig,
        metrics: Arc<dyn MetricsGateway>,
        scaler: Arc<dyn ScalerGateway>,
    ) -> Arc<Self> {
        let threshold =
            ThresholdCoordinator::new(metrics.clone(), cfg.app_name.clone(), cfg.metric_period);
        let stabilization = StabilizationWindowCoordinator::new(
            metrics.clone(),
            cfg.app_name.clone(),
            cfg.metric_period,
        );
        let state = ControlState::new(cfg.target_cpu_utilization);
        Arc::new(Self { cfg, metrics, scaler, threshold, stabilization, state })
    }

    pub fn state(&self) -> &ControlState {
        &self.state
    }

    /// Launch the three loops at the configured cadence. Each tick catches
    /// and logs its own failures; a broken tick never kills a loop.
    pub fn start(self: Arc<Self>) -> Vec<PeriodicTask> {
        info!(target: "general", "model initialization complete");
        let period = Duration::from_secs(self.cfg.metric_period);

        let this = self.clone();
        let scaling = PeriodicScheduler::new("scaling", period).start(move || {
            let this = this.clone();
            async move { this.scaling_tick().await }
        });
        let this = self.clone();
        let threshold = PeriodicScheduler::new("threshold", period).start(move || {
            let this = this.clone();
            async move { this.threshold_tick().await }
        });
        let this = self.clone();
        let stabilization = PeriodicScheduler::new("stabilization", period).start(move || {
            let this = this.clone();
            async move { this.stabilization_tick().await }
        });

        vec![scaling, threshold, stabilization]
    }

    /// Run until SIGINT/SIGTERM, then cancel the loops and let in-flight
    /// ticks finish.
    pub async fn run(self: Arc<Self>) -> anyhow::Result<()> {
        let tasks = self.clone().start();
        wait_for_shutdown().await;
        info!(target: "general", "shutdown signal received");
        for task in &tasks {
            task.stop();
        }
        for task in tasks {
            task.join().await;
        }
        Ok(())
    }

    pub async fn scaling_tick(&self) {
        if let Err(e) = self.try_scale().await {
            error!(target: "autoscaler", error = %e, "scaling tick failed");
        }
    }

    async fn try_scale(&self) -> Result<(), HpaError> {
        {
            let mut cdt = self.state.current_cdt.lock();
            *cdt = cdt.saturating_sub(1);
        }

        let cpu_query = queries::cpu_utilization(
            &self.cfg.deployment,
            &self.cfg.container,
            self.cfg.metric_period,
        );
        let cpu = self.metrics.point(&cpu_query, self.cfg.metric_period).await?;
        if !cpu.is_finite() {
            return Err(HpaError::MetricFetch("cpu sample is not finite".into()));
        }
        info!(target: "autoscaler", cpu, "current cpu utilization");

        let current = self
            .scaler
            .replicas(&self.cfg.namespace, &self.cfg.deployment, self.cfg.metric_period)
            .await?;
        info!(target: "autoscaler", current, "current replicas");

        let target = self.state.target_cpu();
        let desired = (((current as f64) * cpu / target).ceil() as u32)
            .clamp(self.cfg.min_replicas, self.cfg.max_replicas);
        info!(target: "autoscaler", desired, "desired replicas");

        if desired > current {
            // scale-up is immediate, the cool-down only gates scale-down
            self.scaler
                .scale_to(&self.cfg.namespace, &self.cfg.deployment, desired)
                .await?;
            info!(target: "autoscaler", replicas = desired, "scaled up");
            self.reload_cooldown();
        } else if desired < current && self.state.current_cdt() == 0 {
            let trend = self.stabilization.trend().await?;
            if trend.sign() <= 0 {
                self.scaler
                    .scale_to(&self.cfg.namespace, &self.cfg.deployment, desired)
                    .await?;
                info!(target: "autoscaler", replicas = desired, "scaled down");
            } else {
                info!(target: "autoscaler", "scale-down blocked by rising request trend");
            }
            // the cool-down restarts whether or not the scale-down went
            // through
            self.reload_cooldown();
        }
        info!(target: "autoscaler", cdt = self.state.current_cdt(), "final cdt");
        Ok(())
    }

    // Snapshot desired under its own guard first; the two guards are never
    // held at the same time.
    fn reload_cooldown(&self) {
        let desired = *self.state.desired_cdt.lock();
        *self.state.current_cdt.lock() = desired;
    }

    pub async fn threshold_tick(&self) {
        if let Err(e) = self.try_retarget().await {
            error!(target: "threshold", error = %e, "threshold tick failed");
        }
    }

    async fn try_retarget(&self) -> Result<(), HpaError> {
        let query = queries::request_count(&self.cfg.app_name, self.cfg.metric_period);
        let latest = self.metrics.point(&query, self.cfg.metric_period).await?.max(0.0);

        if latest == 0.0 && self.state.start_time().is_none() && !self.state.is_active() {
            // nothing observed yet
            return Ok(());
        }
        self.state.active.store(true, Ordering::SeqCst);

        let (forecast, stable) = {
            let mut model = self.state.forecaster.lock();
            model.update(latest)
        };
        if !stable {
            info!(target: "threshold", latest, "history too short for a model forecast");
            return Ok(());
        }

        let start = {
            let mut st = self.state.start_time.lock();
            *st.get_or_insert_with(Utc::now)
        };
        let new_target = self.threshold.retarget(start, forecast).await?;
        info!(target: "autoscaler", forecast, "model forecast");
        info!(target: "threshold", new_target, "new cpu utilization target");
        *self.state.target_cpu.lock() = new_target;
        Ok(())
    }

    pub async fn stabilization_tick(&self) {
        match self.stabilization.trend().await {
            Ok(trend) => {
                let mut desired = self.state.desired_cdt.lock();
                let before = *desired;
                match trend {
                    Trend::Rising => *desired = (*desired + 1).min(MAX_CDT),
                    Trend::Falling => *desired = desired.saturating_sub(1).max(MIN_CDT),
                    Trend::Flat => {}
                }
                if *desired != before {
                    info!(target: "cdt", desired = *desired, trend = trend.sign(), "desired cool-down adjusted");
                }
            }
            Err(e) => error!(target: "cdt", error = %e, "stabilization tick failed"),
        }
    }
}

async fn wait_for_shutdown() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigint = signal(SignalKind::interrupt()).expect("sigint handler");
    let mut sigterm = signal(SignalKind::terminate()).expect("sigterm handler");
    tokio::select! {
        _ = sigint.recv() => {}
        _ = sigterm.recv() => {}
    }
}
