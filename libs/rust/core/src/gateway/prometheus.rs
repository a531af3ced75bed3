//! Prometheus range-query client.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{MetricsGateway, Sample};
use crate::error::HpaError;

pub struct PrometheusGateway {
    base_url: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct RangeResponse {
    status: String,
    #[serde(default)]
    data: RangeData,
}

#[derive(Debug, Default, Deserialize)]
struct RangeData {
    #[serde(default)]
    result: Vec<RangeSeries>,
}

#[derive(Debug, Deserialize)]
struct RangeSeries {
    #[serde(default)]
    values: Vec<(f64, String)>,
}

impl PrometheusGateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, http: reqwest::Client::new() }
    }

    async fn query_range(
        &self,
        query: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: u64,
    ) -> Result<Vec<Sample>, HpaError> {
        let url = format!("{}/api/v1/query_range", self.base_url);
        let start_s = start.timestamp().to_string();
        let end_s = end.timestamp().to_string();
        let step_s = format!("{step}s");
        let resp = self
            .http
            .get(&url)
            .query(&[
                ("query", query),
                ("start", start_s.as_str()),
                ("end", end_s.as_str()),
                ("step", step_s.as_str()),
            ])
            .send()
            .await
            .map_err(|e| HpaError::MetricFetch(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(HpaError::MetricFetch(format!(
                "prometheus returned {}",
                resp.status()
            )));
        }
        let body: RangeResponse = resp
            .json()
            .await
            .map_err(|e| HpaError::MetricFetch(e.to_string()))?;
        if body.status != "success" {
            return Err(HpaError::MetricFetch(format!(
                "query status {}",
                body.status
            )));
        }
        Ok(flatten(body))
    }
}

// Only the first matched series carries data for the aggregate queries we
// issue; unparseable sample values count as 0.
fn flatten(body: RangeResponse) -> Vec<Sample> {
    body.data
        .result
        .into_iter()
        .next()
        .map(|series| {
            series
                .values
                .into_iter()
                .map(|(unix, raw)| Sample { unix, value: raw.parse().unwrap_or(0.0) })
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl MetricsGateway for PrometheusGateway {
    async fn point(&self, query: &str, period: u64) -> Result<f64, HpaError> {
        let end = Utc::now();
        let start = end - chrono::Duration::seconds(period as i64);
        let samples = self.query_range(query, start, end, period).await?;
        Ok(samples.last().map(|s| s.value).unwrap_or(0.0))
    }

    async fn range_since(
        &self,
        query: &str,
        start: DateTime<Utc>,
        period: u64,
    ) -> Result<Vec<Sample>, HpaError> {
        self.query_range(query, start, Utc::now(), period).await
    }

    async fn window(&self, query: &str, period: u64, n: u64) -> Result<Vec<Sample>, HpaError> {
        let end = Utc::now();
        let start = end - chrono::Duration::seconds((period * n) as i64);
        self.query_range(query, start, end, period).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_matrix_response() {
        let raw = r#"{"status":"success","data":{"resultType":"matrix","result":[{"metric":{"app":"shop"},"values":[[1700000000,"12"],[1700000030,"14.5"],[1700000060,"NaN-ish"]]}]}}"#;
        let body: RangeResponse = serde_json::from_str(raw).unwrap();
        let samples = flatten(body);
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0], Sample { unix: 1700000000.0, value: 12.0 });
        assert_eq!(samples[1].value, 14.5);
        // malformed value falls back to 0
        assert_eq!(samples[2].value, 0.0);
    }

    #[test]
    fn empty_result_set_is_empty() {
        let raw = r#"{"status":"success","data":{"resultType":"matrix","result":[]}}"#;
        let body: RangeResponse = serde_json::from_str(raw).unwrap();
        assert!(flatten(body).is_empty());
    }

    #[test]
    fn error_status_survives_missing_data() {
        let raw = r#"{"status":"error","errorType":"bad_data","error":"parse error"}"#;
        let body: RangeResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(body.status, "error");
        assert!(flatten(body).is_empty());
    }
}
