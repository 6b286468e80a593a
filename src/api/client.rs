//! HTTP client for the metrics backend.
//!
//! Uses reqwest with an optional Bearer token. Non-2xx responses are turned
//! into [`DashboardError::Status`] carrying the server's `detail` field when
//! the body has one.

use std::time::Duration;

use async_trait::async_trait;

use super::MetricsApi;
use crate::error::DashboardError;
use crate::types::Config;

pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self, DashboardError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DashboardError::Config(format!("Failed to build HTTP client: {}", e)))?;

        let parsed = url::Url::parse(base_url)
            .map_err(|e| DashboardError::Config(format!("Invalid API base URL '{}': {}", base_url, e)))?;

        Ok(Self {
            client,
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, DashboardError> {
        let token = super::credential_from_env(&config.token_env);
        if token.is_none() {
            log::debug!(
                "ApiClient: no credential in {}, requests go out unauthenticated",
                config.token_env
            );
        }
        Self::new(
            &config.api_base_url,
            token,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, DashboardError> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status().as_u16();
        let text = resp.text().await.unwrap_or_default();
        Err(DashboardError::Status {
            status,
            detail: extract_detail(&text),
        })
    }
}

#[async_trait]
impl MetricsApi for ApiClient {
    async fn get_json(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<serde_json::Value, DashboardError> {
        let resp = self
            .authorize(self.client.get(self.url(path)).query(query))
            .send()
            .await?;
        let resp = Self::check(resp).await?;

        resp.json().await.map_err(|e| DashboardError::Decode {
            path: path.to_string(),
            message: e.to_string(),
        })
    }

    async fn post_empty(&self, path: &str) -> Result<(), DashboardError> {
        let resp = self.authorize(self.client.post(self.url(path))).send().await?;
        Self::check(resp).await?;
        Ok(())
    }
}

/// Pull a human-readable `detail` out of an error body.
///
/// The backend answers errors with `{"detail": "..."}`; validation failures
/// carry a list of objects with a `msg` each instead.
pub fn extract_detail(body: &str) -> Option<String> {
    let json: serde_json::Value = serde_json::from_str(body).ok()?;
    match json.get("detail")? {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Array(items) => {
            let msgs: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(|m| m.as_str()))
                .collect();
            if msgs.is_empty() {
                None
            } else {
                Some(msgs.join("; "))
            }
        }
        _ => None,
    }
}
