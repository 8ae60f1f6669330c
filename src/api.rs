//! HTTP client for the telemetry service's REST surface.

use serde_json::Value;

use crate::types::anomaly::AnomalyStatus;
use crate::types::xai::XaiExplanation;

#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    async fn get_rows(&self, path: &str) -> Result<Vec<Value>, String> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| format!("GET {} failed: {}", path, e))?;

        if !response.status().is_success() {
            return Err(format!("API error {} on {}", response.status(), path));
        }

        response
            .json::<Vec<Value>>()
            .await
            .map_err(|e| format!("Failed to parse {} response: {}", path, e))
    }

    pub async fn logs_explorer(&self) -> Result<Vec<Value>, String> {
        self.get_rows("/api/logs/explorer").await
    }

    pub async fn anomalies(&self) -> Result<Vec<Value>, String> {
        self.get_rows("/api/anomalies").await
    }

    pub async fn timeline(&self) -> Result<Vec<Value>, String> {
        self.get_rows("/api/timeline").await
    }

    pub async fn patch_anomaly_status(
        &self,
        id: &str,
        status: AnomalyStatus,
    ) -> Result<(), String> {
        let url = format!("{}/api/anomalies/{}/status", self.base_url, id);
        let response = self
            .http
            .patch(&url)
            .query(&[("status", status.as_str())])
            .send()
            .await
            .map_err(|e| format!("PATCH anomaly status failed: {}", e))?;

        if !response.status().is_success() {
            return Err(format!(
                "API error {} updating anomaly {}",
                response.status(),
                id
            ));
        }
        Ok(())
    }

    pub async fn anomaly_xai(&self, id: &str) -> Result<XaiExplanation, String> {
        let url = format!("{}/api/anomalies/{}/xai", self.base_url, id);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| format!("GET xai failed: {}", e))?;

        if !response.status().is_success() {
            return Err(format!(
                "API error {} fetching explanation for {}",
                response.status(),
                id
            ));
        }

        response
            .json::<XaiExplanation>()
            .await
            .map_err(|e| format!("Failed to parse xai response: {}", e))
    }
}
