//! Import-then-refresh workflow.
//!
//! `POST {dashboard}/import` only confirms the server accepted the job. There
//! is no completion signal from the backend, so the shipped
//! [`FixedDelaySignal`] waits a settle delay sized by the dataset and then the
//! dashboard is refreshed once. The wait sits behind [`JobCompletionSignal`]
//! so a real status poll can replace it without touching callers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::error::DashboardError;
use crate::notification::Notification;
use crate::services::dashboard::FetchOrchestrator;
use crate::types::DatasetSize;

/// Resolves when a server-side import is considered finished.
#[async_trait]
pub trait JobCompletionSignal: Send + Sync {
    async fn settled(&self, dashboard: &str, size: DatasetSize);
}

/// Heuristic completion: sleep for the dataset's settle delay.
///
/// Can under- or over-wait the real job.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixedDelaySignal;

#[async_trait]
impl JobCompletionSignal for FixedDelaySignal {
    async fn settled(&self, dashboard: &str, size: DatasetSize) {
        let delay = size.settle_delay();
        log::debug!(
            "Import {}: waiting {}s for server-side job",
            dashboard,
            delay.as_secs()
        );
        tokio::time::sleep(delay).await;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum ImportPhase {
    Idle,
    #[serde(rename_all = "camelCase")]
    Importing {
        started_at: DateTime<Utc>,
        settle_secs: u64,
    },
}

/// A started import. Dropping it does not cancel the scheduled refresh.
pub struct ImportJob {
    pub dashboard: String,
    pub settle_delay: Duration,
    pub started_at: DateTime<Utc>,
    refresh: JoinHandle<()>,
}

impl ImportJob {
    /// Wait until the deferred refresh has run and the workflow is idle again.
    pub async fn finished(self) {
        if let Err(e) = self.refresh.await {
            log::warn!("Import {}: refresh task ended abnormally: {}", self.dashboard, e);
        }
    }
}

/// Returns the workflow to `Idle` when the refresh task ends, including by
/// panic or abort.
struct ResetToIdle(Arc<Mutex<ImportPhase>>);

impl Drop for ResetToIdle {
    fn drop(&mut self) {
        *self.0.lock() = ImportPhase::Idle;
    }
}

/// `Idle -> Importing -> (settle) -> Idle` for one dashboard.
pub struct ImportRefreshWorkflow {
    orchestrator: Arc<FetchOrchestrator>,
    signal: Arc<dyn JobCompletionSignal>,
    phase: Arc<Mutex<ImportPhase>>,
}

impl ImportRefreshWorkflow {
    pub fn new(orchestrator: Arc<FetchOrchestrator>) -> Self {
        Self::with_signal(orchestrator, Arc::new(FixedDelaySignal))
    }

    pub fn with_signal(
        orchestrator: Arc<FetchOrchestrator>,
        signal: Arc<dyn JobCompletionSignal>,
    ) -> Self {
        Self {
            orchestrator,
            signal,
            phase: Arc::new(Mutex::new(ImportPhase::Idle)),
        }
    }

    pub fn phase(&self) -> ImportPhase {
        self.phase.lock().clone()
    }

    pub fn is_importing(&self) -> bool {
        matches!(*self.phase.lock(), ImportPhase::Importing { .. })
    }

    /// The trigger is disabled while an import is in flight.
    pub fn can_trigger(&self) -> bool {
        !self.is_importing()
    }

    /// Trigger the server-side import and schedule one deferred refresh.
    pub async fn start_import(&self) -> Result<ImportJob, DashboardError> {
        let dashboard = self.orchestrator.dashboard_id().to_string();
        let size = self.orchestrator.config().dataset_size;
        let settle_delay = size.settle_delay();
        let started_at = Utc::now();

        {
            let mut phase = self.phase.lock();
            if matches!(*phase, ImportPhase::Importing { .. }) {
                drop(phase);
                let err = DashboardError::ImportInProgress(dashboard);
                self.orchestrator
                    .notifier()
                    .notify(Notification::error("Import", &err));
                return Err(err);
            }
            *phase = ImportPhase::Importing {
                started_at,
                settle_secs: settle_delay.as_secs(),
            };
        }

        let path = self.orchestrator.config().import_path();
        log::info!("Import {}: triggering {}", dashboard, path);

        if let Err(e) = self.orchestrator.api().post_empty(&path).await {
            *self.phase.lock() = ImportPhase::Idle;
            let err = DashboardError::ImportTrigger {
                dashboard: dashboard.clone(),
                source: Box::new(e),
            };
            log::warn!("Import {}: trigger failed: {}", dashboard, err);
            self.orchestrator
                .notifier()
                .notify(Notification::error("Import", &err));
            return Err(err);
        }

        self.orchestrator.notifier().notify(Notification::success(
            "Import started",
            &format!(
                "{} data will refresh in {}s.",
                dashboard,
                settle_delay.as_secs()
            ),
        ));

        let refresh = tokio::spawn({
            let orchestrator = Arc::clone(&self.orchestrator);
            let signal = Arc::clone(&self.signal);
            let phase = Arc::clone(&self.phase);
            let dashboard = dashboard.clone();
            async move {
                let _reset = ResetToIdle(phase);
                signal.settled(&dashboard, size).await;
                log::info!("Import {}: settle delay elapsed, refreshing", dashboard);
                // Failures are already surfaced by the orchestrator.
                let _ = orchestrator.refresh().await;
            }
        });

        Ok(ImportJob {
            dashboard,
            settle_delay,
            started_at,
            refresh,
        })
    }
}
