//! Threshold coordination: request volatility -> CPU utilization target.
//!
//! The rolling mean of absolute one-step request deltas is normalized into a
//! z-score and squashed through a reverse sigmoid, so bursty traffic pulls
//! the target down (scale up earlier) while steady traffic lets it drift
//! toward 95 (tolerate hotter pods).

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::HpaError;
use crate::gateway::{queries, MetricsGateway};

// Rolling window over the absolute delta series. Deliberately a separate
// constant from the forecaster history length even though both default to 10.
const DIFF_WINDOW: usize = 10;

pub struct ThresholdCoordinator {
    metrics: Arc<dyn MetricsGateway>,
    app_name: String,
    period: u64,
}

impl ThresholdCoordinator {
    pub fn new(metrics: Arc<dyn MetricsGateway>, app_name: String, period: u64) -> Self {
        Self { metrics, app_name, period }
    }

    /// Fetch the request series observed since `start_time`, append the
    /// forecaster's one-step-ahead estimate, and squash the newest
    /// volatility z-score into a target in (50, 95).
    pub async fn retarget(&self, start_time: DateTime<Utc>, forecast: f64) -> Result<f64, HpaError> {
        let query = queries::request_count(&self.app_name, self.period);
        let samples = self
            .metrics
            .range_since(&query, start_time, self.period)
            .await?;
        // first sample is the boundary sample, drop it
        let mut series: Vec<f64> = samples.iter().skip(1).map(|s| s.value).collect();
        series.push(forecast);
        Ok(squash_series(&series))
    }
}

/// Volatility squash of a request series: rolling |delta| mean, z-score of
/// the newest entry, reverse sigmoid. Entries without a full window (and
/// degenerate z-scores) count as 0, which maps to the neutral 72.5 target.
pub fn squash_series(series: &[f64]) -> f64 {
    reverse_sigmoid(latest_z_score(series))
}

fn latest_z_score(series: &[f64]) -> f64 {
    if series.len() < DIFF_WINDOW + 1 {
        return 0.0;
    }
    let diffs: Vec<f64> = series.windows(2).map(|w| (w[1] - w[0]).abs()).collect();
    let rolled: Vec<f64> = diffs
        .windows(DIFF_WINDOW)
        .map(|w| w.iter().sum::<f64>() / DIFF_WINDOW as f64)
        .collect();
    let m = rolled.len();
    if m < 2 {
        // sample standard deviation needs at least two defined entries
        return 0.0;
    }
    let mean = rolled.iter().sum::<f64>() / m as f64;
    let var = rolled.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / (m - 1) as f64;
    let std = var.sqrt();
    if !std.is_finite() || std == 0.0 {
        return 0.0;
    }
    let z = (rolled[m - 1] - mean) / std;
    if z.is_finite() { z } else { 0.0 }
}

pub fn reverse_sigmoid(z: f64) -> f64 {
    50.0 + 45.0 * (1.0 - 1.0 / (1.0 + (-z).exp()))
}
