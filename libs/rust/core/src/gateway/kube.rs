//! Kubernetes scale-subresource client.
//!
//! Replica reads come from the metric store (kube-state-metrics) so the API
//! server only sees the scale writes. Auth is the conventional in-cluster
//! service-account token when present; anything richer is out of scope.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use super::{queries, MetricsGateway, ScalerGateway};
use crate::error::HpaError;

const SERVICE_ACCOUNT_TOKEN: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";

pub struct KubeScaler {
    api_url: String,
    metrics: Arc<dyn MetricsGateway>,
    http: reqwest::Client,
    token: Option<String>,
}

impl KubeScaler {
    pub fn new(
        api_url: impl Into<String>,
        metrics: Arc<dyn MetricsGateway>,
    ) -> Result<Self, HpaError> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| HpaError::Config(format!("kube client: {e}")))?;
        let token = std::fs::read_to_string(SERVICE_ACCOUNT_TOKEN)
            .ok()
            .map(|t| t.trim().to_string());
        let api_url = api_url.into().trim_end_matches('/').to_string();
        Ok(Self { api_url, metrics, http, token })
    }
}

#[async_trait]
impl ScalerGateway for KubeScaler {
    async fn replicas(
        &self,
        namespace: &str,
        deployment: &str,
        period: u64,
    ) -> Result<u32, HpaError> {
        let query = queries::replica_count(deployment, namespace);
        let observed = self.metrics.point(&query, period).await?;
        let count = observed.max(0.0) as u32;
        Ok(count.max(1))
    }

    async fn scale_to(
        &self,
        namespace: &str,
        deployment: &str,
        replicas: u32,
    ) -> Result<(), HpaError> {
        let replicas = replicas.max(1);
        let url = format!(
            "{}/apis/apps/v1/namespaces/{namespace}/deployments/{deployment}/scale",
            self.api_url
        );
        let mut req = self
            .http
            .patch(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/merge-patch+json")
            .body(json!({"spec": {"replicas": replicas}}).to_string());
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| HpaError::ScaleWrite(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(HpaError::ScaleWrite(format!(
                "api server returned {}",
                resp.status()
            )));
        }
        debug!(namespace, deployment, replicas, "scale patched");
        Ok(())
    }
}
