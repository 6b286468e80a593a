// Dashboard service: coordinated snapshot loading for one dashboard.
// All sources fan out together; the batch commits only when every one succeeds.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;

use crate::api::MetricsApi;
use crate::error::DashboardError;
use crate::notification::{Notification, Notifier};
use crate::types::{CommitPolicy, DashboardConfig, Scope};

/// One source's payload inside a snapshot.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SnapshotSection {
    pub name: String,
    pub data: serde_json::Value,
}

/// Every source of one dashboard, fetched by the same batch.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub dashboard: String,
    pub sequence: u64,
    pub scope: Scope,
    pub fetched_at: DateTime<Utc>,
    pub sections: Vec<SnapshotSection>,
}

impl DashboardSnapshot {
    pub fn section(&self, name: &str) -> Option<&serde_json::Value> {
        self.sections.iter().find(|s| s.name == name).map(|s| &s.data)
    }

    /// Decode a section into a typed record.
    pub fn decode_section<T: DeserializeOwned>(&self, name: &str) -> Result<T, DashboardError> {
        let data = self.section(name).ok_or_else(|| DashboardError::Decode {
            path: name.to_string(),
            message: format!("no section '{}' in {} snapshot", name, self.dashboard),
        })?;
        serde_json::from_value(data.clone()).map_err(|e| DashboardError::Decode {
            path: name.to_string(),
            message: e.to_string(),
        })
    }
}

/// Serializable view of an orchestrator for status output.
#[derive(Debug, serde::Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DashboardResult {
    Loading {
        previous: Option<Arc<DashboardSnapshot>>,
    },
    Success {
        data: Arc<DashboardSnapshot>,
    },
    Empty {
        message: String,
    },
    Error {
        message: String,
        previous: Option<Arc<DashboardSnapshot>>,
    },
}

#[derive(Debug, Default)]
struct OrchestratorState {
    loading: bool,
    scope: Scope,
    snapshot: Option<Arc<DashboardSnapshot>>,
    /// Sequence handed to the most recently started batch.
    last_started: u64,
    last_error: Option<String>,
}

/// Populates one dashboard from its configured sources.
///
/// Concurrent refreshes are not deduplicated and nothing is cancelled. Each
/// batch raises the loading flag when it starts and lowers it when it settles;
/// under [`CommitPolicy::LastWriterWins`] the batch that settles last owns the
/// snapshot.
pub struct FetchOrchestrator {
    config: DashboardConfig,
    api: Arc<dyn MetricsApi>,
    notifier: Arc<dyn Notifier>,
    policy: CommitPolicy,
    state: Mutex<OrchestratorState>,
}

impl FetchOrchestrator {
    pub fn new(
        config: DashboardConfig,
        api: Arc<dyn MetricsApi>,
        notifier: Arc<dyn Notifier>,
        policy: CommitPolicy,
    ) -> Self {
        Self {
            config,
            api,
            notifier,
            policy,
            state: Mutex::new(OrchestratorState::default()),
        }
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn dashboard_id(&self) -> &str {
        &self.config.id
    }

    pub fn api(&self) -> Arc<dyn MetricsApi> {
        Arc::clone(&self.api)
    }

    pub fn notifier(&self) -> Arc<dyn Notifier> {
        Arc::clone(&self.notifier)
    }

    pub fn is_loading(&self) -> bool {
        self.state.lock().loading
    }

    pub fn snapshot(&self) -> Option<Arc<DashboardSnapshot>> {
        self.state.lock().snapshot.clone()
    }

    pub fn scope(&self) -> Scope {
        self.state.lock().scope.clone()
    }

    pub fn last_error(&self) -> Option<String> {
        self.state.lock().last_error.clone()
    }

    pub fn status(&self) -> DashboardResult {
        let state = self.state.lock();
        if state.loading {
            return DashboardResult::Loading {
                previous: state.snapshot.clone(),
            };
        }
        match (&state.last_error, &state.snapshot) {
            (Some(message), previous) => DashboardResult::Error {
                message: message.clone(),
                previous: previous.clone(),
            },
            (None, Some(snapshot)) => DashboardResult::Success {
                data: Arc::clone(snapshot),
            },
            (None, None) => DashboardResult::Empty {
                message: format!("No {} data loaded yet.", self.config.id),
            },
        }
    }

    /// Change the drill-down scope. Re-runs the batch only when the scope
    /// actually changed; returns `None` otherwise.
    pub async fn set_scope(
        &self,
        scope: Scope,
    ) -> Option<Result<Arc<DashboardSnapshot>, DashboardError>> {
        {
            let mut state = self.state.lock();
            if state.scope == scope {
                return None;
            }
            state.scope = scope;
        }
        Some(self.refresh().await)
    }

    /// Under [`CommitPolicy::LatestRequest`] a batch is superseded once a newer
    /// one has started. A superseded batch never touches the loading flag or
    /// the error state and raises no notification.
    fn is_superseded(&self, state: &OrchestratorState, sequence: u64) -> bool {
        self.policy == CommitPolicy::LatestRequest && sequence < state.last_started
    }

    /// Fetch every source concurrently and commit them as one snapshot.
    ///
    /// On any failure the previous snapshot is kept and a single
    /// notification is raised.
    pub async fn refresh(&self) -> Result<Arc<DashboardSnapshot>, DashboardError> {
        let (sequence, scope) = {
            let mut state = self.state.lock();
            state.loading = true;
            state.last_started += 1;
            (state.last_started, state.scope.clone())
        };

        let total = self.config.sources.len();
        log::info!(
            "Dashboard {}: batch #{} fetching {} sources",
            self.config.id,
            sequence,
            total
        );

        let query = scope.query_pairs();
        let fetches = self.config.sources.iter().map(|source| {
            let path = self.config.source_path(source);
            let query = &query;
            async move {
                let result = self.api.get_json(&path, query).await;
                (source.name.clone(), path, result)
            }
        });
        let results = join_all(fetches).await;

        let mut sections = Vec::with_capacity(total);
        let mut failures = Vec::new();
        for (name, path, result) in results {
            match result {
                Ok(data) => sections.push(SnapshotSection { name, data }),
                Err(e) => {
                    log::warn!("Dashboard {}: {} failed: {}", self.config.id, path, e);
                    failures.push(e);
                }
            }
        }

        if let Some(first) = failures.first() {
            let err = DashboardError::FetchBatch {
                dashboard: self.config.id.clone(),
                failed: failures.len(),
                total,
                source: Box::new(first.clone()),
            };
            {
                let mut state = self.state.lock();
                if self.is_superseded(&state, sequence) {
                    log::info!(
                        "Dashboard {}: ignoring failure of stale batch #{} (#{} started since)",
                        self.config.id,
                        sequence,
                        state.last_started
                    );
                    return Err(err);
                }
                state.loading = false;
                state.last_error = Some(err.user_message());
            }
            self.notifier.notify(Notification::error(
                &format!("Loading {} dashboard", self.config.id),
                &err,
            ));
            return Err(err);
        }

        let snapshot = Arc::new(DashboardSnapshot {
            dashboard: self.config.id.clone(),
            sequence,
            scope,
            fetched_at: Utc::now(),
            sections,
        });

        let mut state = self.state.lock();
        if !self.is_superseded(&state, sequence) {
            state.loading = false;
            state.last_error = None;
        }
        let committed = state.snapshot.as_ref().map(|s| s.sequence).unwrap_or(0);
        if self.policy == CommitPolicy::LatestRequest && sequence < committed {
            log::info!(
                "Dashboard {}: dropping stale batch #{} (#{} already committed)",
                self.config.id,
                sequence,
                committed
            );
            return Ok(state.snapshot.clone().unwrap_or(snapshot));
        }

        log::info!(
            "Dashboard {}: committed batch #{} ({} sources)",
            self.config.id,
            sequence,
            total
        );
        state.snapshot = Some(Arc::clone(&snapshot));
        Ok(snapshot)
    }
}
