//! PromQL builders for the series the autoscaler consumes.

/// Container CPU usage against its quota, as a percentage.
pub fn cpu_utilization(deployment: &str, container: &str, period: u64) -> String {
    format!(
        "(sum(rate(container_cpu_usage_seconds_total{{cpu=\"total\", pod=~\"{deployment}-.*\", container=\"{container}\"}}[{period}s])) * 1000) / (sum(container_spec_cpu_quota{{container=\"{container}\"}} / 100)) * 100"
    )
}

/// Replica count as observed by kube-state-metrics.
pub fn replica_count(deployment: &str, namespace: &str) -> String {
    format!(
        "kube_deployment_status_replicas{{deployment=\"{deployment}\", namespace=\"{namespace}\"}}"
    )
}

/// Requests routed to the application over one step.
pub fn request_count(app: &str, period: u64) -> String {
    format!("sum(increase(istio_requests_total{{app=\"{app}\"}}[{period}s])) by (app)")
}
