//! Environment-driven configuration.
//!
//! Mirrors the deployment contract: identity and backends come from env
//! vars (`NAMESPACE`, `DEPLOYMENT`, `CONTAINER`, `APP_NAME`,
//! `PROMETHEUS_IP` required), tunables carry defaults.

use serde::Deserialize;

use crate::error::HpaError;

#[derive(Debug, Clone, Deserialize)]
pub struct AutoscalerConfig {
    pub namespace: String,
    pub deployment: String,
    pub container: String,
    pub app_name: String,
    pub target_cpu_utilization: f64,
    pub min_replicas: u32,
    pub max_replicas: u32,
    pub metric_period: u64,
    pub prometheus_ip: String,
    pub kube_api_url: String,
    pub log_dir: String,
    pub health_port: u16,
}

impl AutoscalerConfig {
    pub fn from_env() -> Result<Self, HpaError> {
        let cfg = config::Config::builder()
            .set_default("target_cpu_utilization", 75)?
            .set_default("min_replicas", 1)?
            .set_default("max_replicas", 15)?
            .set_default("metric_period", 30)?
            .set_default("kube_api_url", "https://kubernetes.default.svc")?
            .set_default("log_dir", "./log")?
            .set_default("health_port", 8080)?
            .add_source(config::Environment::default().try_parsing(true))
            .build()?;
        let parsed: AutoscalerConfig = cfg.try_deserialize()?;
        parsed.validate()?;
        Ok(parsed)
    }

    pub fn validate(&self) -> Result<(), HpaError> {
        if self.namespace.is_empty()
            || self.deployment.is_empty()
            || self.container.is_empty()
            || self.app_name.is_empty()
        {
            return Err(HpaError::Config("workload identity must not be empty".into()));
        }
        if self.prometheus_ip.is_empty() {
            return Err(HpaError::Config("PROMETHEUS_IP must be set".into()));
        }
        if self.min_replicas < 1 {
            return Err(HpaError::Config("MIN_REPLICAS must be at least 1".into()));
        }
        if self.max_replicas < self.min_replicas {
            return Err(HpaError::Config(
                "MAX_REPLICAS must be >= MIN_REPLICAS".into(),
            ));
        }
        if !(self.target_cpu_utilization > 0.0 && self.target_cpu_utilization <= 100.0) {
            return Err(HpaError::Config(
                "TARGET_CPU_UTILIZATION must be in (0, 100]".into(),
            ));
        }
        if self.metric_period < 1 {
            return Err(HpaError::Config("METRIC_PERIOD must be at least 1s".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> AutoscalerConfig {
        AutoscalerConfig {
            namespace: "prod".into(),
            deployment: "web".into(),
            container: "app".into(),
            app_name: "shop".into(),
            target_cpu_utilization: 75.0,
            min_replicas: 1,
            max_replicas: 15,
            metric_period: 30,
            prometheus_ip: "http://prometheus:9090".into(),
            kube_api_url: "https://kubernetes.default.svc".into(),
            log_dir: "./log".into(),
            health_port: 8080,
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn empty_identity_rejected() {
        let mut cfg = valid();
        cfg.deployment.clear();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn replica_bounds_rejected_when_inverted() {
        let mut cfg = valid();
        cfg.min_replicas = 10;
        cfg.max_replicas = 3;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_min_replicas_rejected() {
        let mut cfg = valid();
        cfg.min_replicas = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn target_out_of_range_rejected() {
        let mut cfg = valid();
        cfg.target_cpu_utilization = 0.0;
        assert!(cfg.validate().is_err());
        cfg.target_cpu_utilization = 120.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_period_rejected() {
        let mut cfg = valid();
        cfg.metric_period = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn from_env_reads_identity_and_defaults() {
        std::env::set_var("NAMESPACE", "staging");
        std::env::set_var("DEPLOYMENT", "web");
        std::env::set_var("CONTAINER", "app");
        std::env::set_var("APP_NAME", "shop");
        std::env::set_var("PROMETHEUS_IP", "http://prometheus:9090");
        std::env::set_var("MAX_REPLICAS", "20");

        let cfg = AutoscalerConfig::from_env().unwrap();
        assert_eq!(cfg.namespace, "staging");
        assert_eq!(cfg.max_replicas, 20);
        assert_eq!(cfg.min_replicas, 1);
        assert_eq!(cfg.metric_period, 30);
        assert_eq!(cfg.target_cpu_utilization, 75.0);
        assert_eq!(cfg.kube_api_url, "https://kubernetes.default.svc");
    }
}
