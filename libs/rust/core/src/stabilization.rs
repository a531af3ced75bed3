//! Stabilization-window coordination: request trend gated by Durbin-Watson.
//!
//! Fits a least-squares line over the last hour of request samples and
//! reports the slope sign, but only when the Durbin-Watson statistic of the
//! residuals sits in the non-autocorrelation acceptance band. Serially
//! correlated residuals mean the linear fit is not trustworthy, so the
//! decision defaults to "hold".

use std::sync::Arc;

use crate::error::HpaError;
use crate::gateway::{queries, MetricsGateway};

const WINDOW_STEPS: u64 = 60;
// acceptance band for a=0.05, k=1, n=60
const DW_LOWER: f64 = 1.616;
const DW_UPPER: f64 = 2.384;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Rising,
    Flat,
    Falling,
}

impl Trend {
    pub fn sign(self) -> i32 {
        match self {
            Trend::Rising => 1,
            Trend::Flat => 0,
            Trend::Falling => -1,
        }
    }
}

pub struct StabilizationWindowCoordinator {
    metrics: Arc<dyn MetricsGateway>,
    app_name: String,
    period: u64,
}

impl StabilizationWindowCoordinator {
    pub fn new(metrics: Arc<dyn MetricsGateway>, app_name: String, period: u64) -> Self {
        Self { metrics, app_name, period }
    }

    pub async fn trend(&self) -> Result<Trend, HpaError> {
        let query = queries::request_count(&self.app_name, self.period);
        let samples = self
            .metrics
            .window(&query, self.period, WINDOW_STEPS)
            .await?;
        // first sample is the boundary sample, drop it
        let series: Vec<f64> = samples.iter().skip(1).map(|s| s.value).collect();
        Ok(classify(&series))
    }
}

/// Slope sign of the series, or `Flat` when the Durbin-Watson gate rejects
/// the fit.
pub fn classify(series: &[f64]) -> Trend {
    if series.len() < 2 {
        return Trend::Flat;
    }
    let (slope, intercept) = least_squares(series);
    let residuals: Vec<f64> = series
        .iter()
        .enumerate()
        .map(|(i, y)| y - (intercept + slope * i as f64))
        .collect();
    let dw = durbin_watson(&residuals);
    if (DW_LOWER..=DW_UPPER).contains(&dw) {
        if slope > 0.0 {
            Trend::Rising
        } else if slope < 0.0 {
            Trend::Falling
        } else {
            Trend::Flat
        }
    } else {
        Trend::Flat
    }
}

fn least_squares(y: &[f64]) -> (f64, f64) {
    let n = y.len() as f64;
    let mean_x = (y.len() - 1) as f64 / 2.0;
    let mean_y = y.iter().sum::<f64>() / n;
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    for (i, v) in y.iter().enumerate() {
        let dx = i as f64 - mean_x;
        sxy += dx * (v - mean_y);
        sxx += dx * dx;
    }
    let slope = if sxx == 0.0 { 0.0 } else { sxy / sxx };
    (slope, mean_y - slope * mean_x)
}

fn durbin_watson(residuals: &[f64]) -> f64 {
    let ss: f64 = residuals.iter().map(|e| e * e).sum();
    if ss == 0.0 {
        return 0.0;
    }
    let num: f64 = residuals.windows(2).map(|w| (w[1] - w[0]).powi(2)).sum();
    num / ss
}
