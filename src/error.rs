//! Error types for dashboard orchestration
//!
//! Every failure is caught at the orchestration boundary and turned into a
//! single user-visible [`crate::notification::Notification`]. Errors are
//! classified by where they happened:
//! - Batch: one of a dashboard's parallel sources failed
//! - Import: the import trigger was rejected or is already running
//! - Prediction: a single on-demand analysis failed
//! - Transport: the request itself (network, status, body)

use thiserror::Error;

/// Error types for dashboard data loading
#[derive(Debug, Clone, Error)]
pub enum DashboardError {
    // Transport
    #[error("Network error: {0}")]
    Http(String),

    #[error("Server returned {status}: {}", .detail.as_deref().unwrap_or("no detail"))]
    Status { status: u16, detail: Option<String> },

    #[error("Failed to decode response from {path}: {message}")]
    Decode { path: String, message: String },

    // Orchestration
    #[error("Failed to load {dashboard} dashboard ({failed} of {total} sources failed): {source}")]
    FetchBatch {
        dashboard: String,
        failed: usize,
        total: usize,
        #[source]
        source: Box<DashboardError>,
    },

    #[error("Failed to start {dashboard} import: {source}")]
    ImportTrigger {
        dashboard: String,
        #[source]
        source: Box<DashboardError>,
    },

    #[error("An import for {0} is already running")]
    ImportInProgress(String),

    #[error("Failed to generate {kind} analysis: {source}")]
    PredictionFetch {
        kind: String,
        #[source]
        source: Box<DashboardError>,
    },

    #[error("Unknown dashboard: {0}")]
    UnknownDashboard(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl DashboardError {
    /// The most specific message available for the user: a server-supplied
    /// `detail` wins over everything, otherwise a generic per-category message.
    pub fn user_message(&self) -> String {
        if let Some(detail) = self.server_detail() {
            return detail.to_string();
        }
        match self {
            DashboardError::Http(_) => "Could not reach the server. Check your connection.".into(),
            DashboardError::Status { .. } => "The server could not complete the request.".into(),
            DashboardError::Decode { .. } => "The server sent data in an unexpected format.".into(),
            DashboardError::FetchBatch { .. } => "Failed to load dashboard data.".into(),
            DashboardError::ImportTrigger { .. } => "Failed to start the data import.".into(),
            DashboardError::ImportInProgress(_) => "An import is already running.".into(),
            DashboardError::PredictionFetch { .. } => "Failed to generate the analysis.".into(),
            DashboardError::UnknownDashboard(id) => format!("Unknown dashboard: {}", id),
            DashboardError::Config(msg) => msg.clone(),
        }
    }

    /// Walk wrapped errors down to a server `detail` field, if any.
    pub fn server_detail(&self) -> Option<&str> {
        match self {
            DashboardError::Status { detail, .. } => detail.as_deref(),
            DashboardError::FetchBatch { source, .. }
            | DashboardError::ImportTrigger { source, .. }
            | DashboardError::PredictionFetch { source, .. } => source.server_detail(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for DashboardError {
    fn from(err: reqwest::Error) -> Self {
        DashboardError::Http(err.to_string())
    }
}
