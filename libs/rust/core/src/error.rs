//! Error taxonomy shared across the autoscaler crates.
//!
//! `MetricFetch` and `ScaleWrite` are transient: the control loops log them
//! and re-evaluate on the next tick. `Config` is fatal at startup.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HpaError {
    #[error("metric fetch failed: {0}")]
    MetricFetch(String),

    #[error("scale write failed: {0}")]
    ScaleWrite(String),

    #[error("forecaster error: {0}")]
    Forecaster(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<config::ConfigError> for HpaError {
    fn from(e: config::ConfigError) -> Self {
        HpaError::Config(e.to_string())
    }
}
