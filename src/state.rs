use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::api::client::ApiClient;
use crate::api::MetricsApi;
use crate::error::DashboardError;
use crate::notification::{LogNotifier, Notifier};
use crate::services::dashboard::FetchOrchestrator;
use crate::services::import::ImportRefreshWorkflow;
use crate::services::predictions::PredictionCache;
use crate::types::Config;

/// Overrides `apiBaseUrl` from the config file.
pub const API_URL_ENV: &str = "SCHOOLPULSE_API_URL";

/// Shared application state: one orchestrator and import workflow per
/// dashboard, one prediction cache for the analytics tab.
pub struct AppState {
    pub config: Config,
    pub api: Arc<dyn MetricsApi>,
    pub notifier: Arc<dyn Notifier>,
    pub predictions: PredictionCache,
    dashboards: HashMap<String, Arc<FetchOrchestrator>>,
    imports: HashMap<String, ImportRefreshWorkflow>,
}

impl AppState {
    /// Build state against the live backend described by `config`.
    pub fn new(config: Config) -> Result<Self, DashboardError> {
        let api: Arc<dyn MetricsApi> = Arc::new(ApiClient::from_config(&config)?);
        Ok(Self::with_parts(config, api, Arc::new(LogNotifier)))
    }

    pub fn with_parts(config: Config, api: Arc<dyn MetricsApi>, notifier: Arc<dyn Notifier>) -> Self {
        let mut dashboards = HashMap::new();
        let mut imports = HashMap::new();
        for dashboard in &config.dashboards {
            let orchestrator = Arc::new(FetchOrchestrator::new(
                dashboard.clone(),
                Arc::clone(&api),
                Arc::clone(&notifier),
                config.commit_policy,
            ));
            imports.insert(
                dashboard.id.clone(),
                ImportRefreshWorkflow::new(Arc::clone(&orchestrator)),
            );
            dashboards.insert(dashboard.id.clone(), orchestrator);
        }

        let predictions = PredictionCache::new(
            Arc::clone(&api),
            Arc::clone(&notifier),
            &config.analytics_base_path,
        );

        Self {
            config,
            api,
            notifier,
            predictions,
            dashboards,
            imports,
        }
    }

    pub fn dashboard(&self, id: &str) -> Result<Arc<FetchOrchestrator>, DashboardError> {
        self.dashboards
            .get(id)
            .cloned()
            .ok_or_else(|| DashboardError::UnknownDashboard(id.to_string()))
    }

    pub fn import(&self, id: &str) -> Result<&ImportRefreshWorkflow, DashboardError> {
        self.imports
            .get(id)
            .ok_or_else(|| DashboardError::UnknownDashboard(id.to_string()))
    }

    pub fn dashboard_ids(&self) -> Vec<&str> {
        self.config.dashboards.iter().map(|d| d.id.as_str()).collect()
    }
}

/// Default config location: ~/.schoolpulse/config.json
pub fn default_config_path() -> Result<PathBuf, DashboardError> {
    let home = dirs::home_dir()
        .ok_or_else(|| DashboardError::Config("Could not find home directory".to_string()))?;
    Ok(home.join(".schoolpulse").join("config.json"))
}

/// Load config from `path`, falling back to defaults when the file is absent.
/// `SCHOOLPULSE_API_URL` wins over the file's `apiBaseUrl`.
pub fn load_config(path: &Path) -> Result<Config, DashboardError> {
    let mut config = if path.exists() {
        let content = fs::read_to_string(path)
            .map_err(|e| DashboardError::Config(format!("Failed to read config: {}", e)))?;
        serde_json::from_str(&content)
            .map_err(|e| DashboardError::Config(format!("Failed to parse config: {}", e)))?
    } else {
        log::info!("No config at {}, using defaults", path.display());
        Config::default()
    };

    if let Ok(url) = std::env::var(API_URL_ENV) {
        if !url.trim().is_empty() {
            config.api_base_url = url.trim().to_string();
        }
    }

    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &Config) -> Result<(), DashboardError> {
    let mut seen = std::collections::HashSet::new();
    for dashboard in &config.dashboards {
        if !seen.insert(dashboard.id.as_str()) {
            return Err(DashboardError::Config(format!(
                "Duplicate dashboard id: {}",
                dashboard.id
            )));
        }
        if dashboard.sources.is_empty() {
            return Err(DashboardError::Config(format!(
                "Dashboard {} has no sources",
                dashboard.id
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::FakeApi;
    use crate::notification::RecordingNotifier;

    #[test]
    fn test_load_config_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("config.json")).unwrap();
        assert_eq!(config.dashboards.len(), 3);
    }

    #[test]
    fn test_load_config_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{ "tokenEnv": "PUNE_TOKEN", "requestTimeoutSecs": 5,
                 "dashboards": [{ "id": "apaar", "basePath": "/api/apaar",
                                  "sources": [{ "name": "overview", "path": "overview" }] }] }"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.token_env, "PUNE_TOKEN");
        assert_eq!(config.request_timeout_secs, 5);
        assert_eq!(config.dashboards.len(), 1);
    }

    #[test]
    fn test_load_config_rejects_bad_json_and_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(load_config(&path), Err(DashboardError::Config(_))));

        fs::write(
            &path,
            r#"{ "dashboards": [
                { "id": "apaar", "basePath": "/a", "sources": [{ "name": "o", "path": "o" }] },
                { "id": "apaar", "basePath": "/b", "sources": [{ "name": "o", "path": "o" }] }
            ] }"#,
        )
        .unwrap();
        let err = load_config(&path).unwrap_err();
        assert_eq!(err.to_string(), "Configuration error: Duplicate dashboard id: apaar");
    }

    #[test]
    fn test_state_wires_every_dashboard() {
        let state = AppState::with_parts(
            Config::default(),
            Arc::new(FakeApi::new()),
            Arc::new(RecordingNotifier::new()),
        );
        assert_eq!(state.dashboard_ids(), vec!["apaar", "aadhaar", "dropbox"]);
        assert!(state.dashboard("aadhaar").is_ok());
        assert!(state.import("dropbox").unwrap().can_trigger());
        assert!(matches!(
            state.dashboard("udise"),
            Err(DashboardError::UnknownDashboard(_))
        ));
    }
}
