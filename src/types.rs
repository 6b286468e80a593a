use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration loaded from ~/.schoolpulse/config.json
///
/// Every key is optional; a missing file yields the defaults below.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Name of the environment variable holding the bearer token.
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub commit_policy: CommitPolicy,
    #[serde(default = "default_analytics_base_path")]
    pub analytics_base_path: String,
    #[serde(default = "default_dashboards")]
    pub dashboards: Vec<DashboardConfig>,
}

fn default_api_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_token_env() -> String {
    "SCHOOLPULSE_API_TOKEN".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_analytics_base_path() -> String {
    "/api/analytics".to_string()
}

fn default_dashboards() -> Vec<DashboardConfig> {
    vec![
        DashboardConfig::with_standard_sources("apaar", "/api/apaar", DatasetSize::Small),
        DashboardConfig::with_standard_sources("aadhaar", "/api/aadhaar", DatasetSize::Large),
        DashboardConfig::with_standard_sources("dropbox", "/api/dropbox", DatasetSize::Small),
    ]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            token_env: default_token_env(),
            request_timeout_secs: default_request_timeout_secs(),
            commit_policy: CommitPolicy::default(),
            analytics_base_path: default_analytics_base_path(),
            dashboards: default_dashboards(),
        }
    }
}

impl Config {
    pub fn dashboard(&self, id: &str) -> Option<&DashboardConfig> {
        self.dashboards.iter().find(|d| d.id == id)
    }
}

/// What to do with a batch that settles after a newer batch already committed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CommitPolicy {
    /// Whichever batch resolves last owns the snapshot.
    #[default]
    LastWriterWins,
    /// Drop results from a batch older than the committed one.
    LatestRequest,
}

/// Declared size of a dashboard's import dataset; picks the settle delay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetSize {
    #[default]
    Small,
    Large,
}

impl DatasetSize {
    pub fn settle_delay(self) -> Duration {
        match self {
            DatasetSize::Small => Duration::from_secs(10),
            DatasetSize::Large => Duration::from_secs(20),
        }
    }
}

/// One dashboard: a base path plus the sources that make up its snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardConfig {
    pub id: String,
    pub base_path: String,
    #[serde(default)]
    pub sources: Vec<SourceSpec>,
    #[serde(default)]
    pub dataset_size: DatasetSize,
}

/// Endpoints shared by every metrics dashboard, in display order.
pub const STANDARD_SOURCES: [&str; 7] = [
    "overview",
    "status-funnel",
    "block-wise",
    "class-wise",
    "top-pending-schools",
    "low-performing-schools",
    "risk-schools",
];

impl DashboardConfig {
    pub fn with_standard_sources(id: &str, base_path: &str, dataset_size: DatasetSize) -> Self {
        Self {
            id: id.to_string(),
            base_path: base_path.to_string(),
            sources: STANDARD_SOURCES.iter().map(|s| SourceSpec::named(s)).collect(),
            dataset_size,
        }
    }

    pub fn source_path(&self, source: &SourceSpec) -> String {
        join_path(&self.base_path, &source.path)
    }

    pub fn import_path(&self) -> String {
        join_path(&self.base_path, "import")
    }
}

/// A single snapshot source. `path` is relative to the dashboard base path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceSpec {
    pub name: String,
    pub path: String,
}

impl SourceSpec {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            path: name.to_string(),
        }
    }
}

pub(crate) fn join_path(base: &str, tail: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        tail.trim_start_matches('/')
    )
}

/// Drill-down filter District -> Block -> School.
///
/// Changing the scope invalidates the current snapshot and re-runs the fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub district_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub udise_code: Option<String>,
}

impl Scope {
    /// Query pairs for the non-empty levels, in drill-down order.
    pub fn query_pairs(&self) -> Vec<(&'static str, &str)> {
        [
            ("district_code", &self.district_code),
            ("block_code", &self.block_code),
            ("udise_code", &self.udise_code),
        ]
        .into_iter()
        .filter_map(|(key, value)| match value.as_deref() {
            Some(v) if !v.is_empty() => Some((key, v)),
            _ => None,
        })
        .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.query_pairs().is_empty()
    }
}

/// Red/amber/green status the server assigns from the school health index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RagStatus {
    Green,
    Amber,
    #[default]
    Red,
}

/// Per-block metrics from `map/block-metrics`. Values arrive pre-rounded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockMetricRow {
    pub block_name: String,
    #[serde(default)]
    pub schools: u64,
    #[serde(default)]
    pub students: u64,
    #[serde(default)]
    pub teachers: u64,
    #[serde(default)]
    pub classroom_health: f64,
    #[serde(default)]
    pub toilet_functional: f64,
    #[serde(default)]
    pub apaar_rate: f64,
    #[serde(default)]
    pub teacher_quality: f64,
    #[serde(default)]
    pub shi_score: f64,
    #[serde(default)]
    pub rag_status: RagStatus,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerRange {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlockMetricsResponse {
    #[serde(default)]
    pub blocks: Vec<BlockMetricRow>,
    #[serde(default)]
    pub total_blocks: usize,
    #[serde(default)]
    pub metric_ranges: std::collections::HashMap<String, ServerRange>,
}

/// Whether the backend will generate narrative insights.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsightsStatus {
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub model: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_from_empty_object() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.api_base_url, "http://localhost:8000");
        assert_eq!(config.commit_policy, CommitPolicy::LastWriterWins);
        assert_eq!(config.dashboards.len(), 3);
        let aadhaar = config.dashboard("aadhaar").unwrap();
        assert_eq!(aadhaar.dataset_size, DatasetSize::Large);
        assert_eq!(aadhaar.sources.len(), 7);
    }

    #[test]
    fn test_config_camel_case_keys() {
        let config: Config = serde_json::from_str(
            r#"{
                "apiBaseUrl": "https://dash.example.org",
                "commitPolicy": "latestRequest",
                "dashboards": [
                    { "id": "apaar", "basePath": "/api/apaar/", "sources": [{ "name": "overview", "path": "overview" }], "datasetSize": "large" }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(config.commit_policy, CommitPolicy::LatestRequest);
        let apaar = config.dashboard("apaar").unwrap();
        assert_eq!(apaar.source_path(&apaar.sources[0]), "/api/apaar/overview");
        assert_eq!(apaar.import_path(), "/api/apaar/import");
        assert!(config.dashboard("aadhaar").is_none());
    }

    #[test]
    fn test_settle_delay_by_dataset_size() {
        assert_eq!(DatasetSize::Small.settle_delay(), Duration::from_secs(10));
        assert_eq!(DatasetSize::Large.settle_delay(), Duration::from_secs(20));
    }

    #[test]
    fn test_scope_query_pairs_skip_empty_levels() {
        let scope = Scope {
            district_code: Some("2725".to_string()),
            block_code: Some(String::new()),
            udise_code: None,
        };
        assert_eq!(scope.query_pairs(), vec![("district_code", "2725")]);
        assert!(!scope.is_empty());
        assert!(Scope::default().is_empty());
    }

    #[test]
    fn test_block_metric_row_decodes_server_shape() {
        let row: BlockMetricRow = serde_json::from_str(
            r#"{"block_name":"Haveli","schools":412,"students":98000,"teachers":3100,
                "classroom_health":81.2,"toilet_functional":92.5,"apaar_rate":77.0,
                "teacher_quality":6.4,"shi_score":81.9,"rag_status":"green"}"#,
        )
        .unwrap();
        assert_eq!(row.block_name, "Haveli");
        assert_eq!(row.rag_status, RagStatus::Green);
        assert_eq!(row.shi_score, 81.9);
    }
}
