//! On-demand AI analyses, memoized per kind.
//!
//! Generation is expensive and user-initiated, so results never expire and
//! are never refreshed in the background: a kind is fetched on its first
//! request and again only on an explicit [`PredictionCache::refresh`].
//! Only one kind at a time is shown as loading.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use crate::api::MetricsApi;
use crate::error::DashboardError;
use crate::notification::{Notification, Notifier};
use crate::parser::{parse_insight_sections, InsightSections};
use crate::types::{join_path, InsightsStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionKind {
    Dropout,
    Infrastructure,
    Teacher,
    Completion,
    Executive,
}

impl PredictionKind {
    pub const ALL: [PredictionKind; 5] = [
        PredictionKind::Dropout,
        PredictionKind::Infrastructure,
        PredictionKind::Teacher,
        PredictionKind::Completion,
        PredictionKind::Executive,
    ];

    /// Path relative to the analytics base.
    pub fn endpoint(self) -> &'static str {
        match self {
            PredictionKind::Dropout => "predictions/dropout-risk",
            PredictionKind::Infrastructure => "predictions/infrastructure-forecast",
            PredictionKind::Teacher => "predictions/teacher-shortage",
            PredictionKind::Completion => "predictions/data-completion",
            PredictionKind::Executive => "insights/executive-summary",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PredictionKind::Dropout => "dropout",
            PredictionKind::Infrastructure => "infrastructure",
            PredictionKind::Teacher => "teacher",
            PredictionKind::Completion => "completion",
            PredictionKind::Executive => "executive",
        }
    }

    fn summary_key(self) -> &'static str {
        match self {
            PredictionKind::Executive => "metrics",
            _ => "summary",
        }
    }

    fn breakdown_key(self) -> Option<&'static str> {
        match self {
            PredictionKind::Dropout => Some("block_risk_data"),
            PredictionKind::Infrastructure | PredictionKind::Teacher => Some("block_forecast"),
            PredictionKind::Completion => Some("block_data"),
            PredictionKind::Executive => None,
        }
    }

    fn narrative_key(self) -> &'static str {
        match self {
            PredictionKind::Executive => "ai_summary",
            _ => "ai_insights",
        }
    }
}

impl fmt::Display for PredictionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PredictionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        PredictionKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s || k.endpoint().ends_with(&format!("/{}", s)))
            .ok_or_else(|| {
                let kinds: Vec<&str> = PredictionKind::ALL.iter().map(|k| k.as_str()).collect();
                format!("unknown prediction kind '{}', expected one of: {}", s, kinds.join(", "))
            })
    }
}

/// One generated analysis.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResult {
    pub kind: PredictionKind,
    pub summary: serde_json::Value,
    pub breakdown: Vec<serde_json::Value>,
    pub narrative: Option<String>,
    pub generated_at: Option<DateTime<Utc>>,
    /// Kind-specific extras, e.g. the teacher age distribution.
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    pub extras: serde_json::Map<String, serde_json::Value>,
}

impl PredictionResult {
    pub fn from_response(kind: PredictionKind, json: serde_json::Value) -> Result<Self, DashboardError> {
        let decode_err = |message: String| DashboardError::Decode {
            path: kind.endpoint().to_string(),
            message,
        };

        let serde_json::Value::Object(mut body) = json else {
            return Err(decode_err("expected a JSON object".to_string()));
        };

        let summary = body
            .remove(kind.summary_key())
            .unwrap_or(serde_json::Value::Object(Default::default()));

        let breakdown = match kind.breakdown_key().and_then(|key| body.remove(key)) {
            Some(serde_json::Value::Array(rows)) => rows,
            Some(serde_json::Value::Null) | None => Vec::new(),
            Some(_) => return Err(decode_err("breakdown is not an array".to_string())),
        };

        let narrative = match body.remove(kind.narrative_key()) {
            Some(serde_json::Value::String(s)) => Some(s),
            _ => None,
        };

        let generated_at = body
            .remove("generated_at")
            .and_then(|v| v.as_str().map(str::to_string))
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        Ok(Self {
            kind,
            summary,
            breakdown,
            narrative,
            generated_at,
            extras: body,
        })
    }

    /// Narrative split into its display buckets.
    pub fn sections(&self) -> InsightSections {
        self.narrative
            .as_deref()
            .map(parse_insight_sections)
            .unwrap_or_default()
    }
}

/// Lifecycle of one kind in the cache.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "camelCase")]
pub enum PredictionState {
    #[default]
    NotRequested,
    /// In flight; `previous` is the last good result, kept across re-requests.
    Pending {
        previous: Option<Arc<PredictionResult>>,
    },
    Ready(Arc<PredictionResult>),
    Failed(String),
}

impl PredictionState {
    /// The usable result, if any, regardless of an in-flight re-request.
    pub fn result(&self) -> Option<Arc<PredictionResult>> {
        match self {
            PredictionState::Ready(r) => Some(Arc::clone(r)),
            PredictionState::Pending { previous } => previous.clone(),
            _ => None,
        }
    }
}

/// What a request produced.
#[derive(Debug, Clone)]
pub enum RequestOutcome {
    /// Served from the cache; no network call.
    Cached(Arc<PredictionResult>),
    Fetched(Arc<PredictionResult>),
    /// Already being generated; this call only moved the loading indicator.
    InFlight,
}

impl RequestOutcome {
    pub fn result(&self) -> Option<Arc<PredictionResult>> {
        match self {
            RequestOutcome::Cached(r) | RequestOutcome::Fetched(r) => Some(Arc::clone(r)),
            RequestOutcome::InFlight => None,
        }
    }
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<PredictionKind, PredictionState>,
    /// Single global loading slot.
    loading: Option<PredictionKind>,
}

pub struct PredictionCache {
    api: Arc<dyn MetricsApi>,
    notifier: Arc<dyn Notifier>,
    base_path: String,
    inner: Mutex<CacheInner>,
}

impl PredictionCache {
    pub fn new(api: Arc<dyn MetricsApi>, notifier: Arc<dyn Notifier>, base_path: &str) -> Self {
        Self {
            api,
            notifier,
            base_path: base_path.to_string(),
            inner: Mutex::new(CacheInner::default()),
        }
    }

    pub fn state(&self, kind: PredictionKind) -> PredictionState {
        self.inner
            .lock()
            .entries
            .get(&kind)
            .cloned()
            .unwrap_or_default()
    }

    pub fn get(&self, kind: PredictionKind) -> Option<Arc<PredictionResult>> {
        self.state(kind).result()
    }

    /// The one kind currently shown as loading.
    pub fn loading(&self) -> Option<PredictionKind> {
        self.inner.lock().loading
    }

    /// Return the cached result, or generate it on first request.
    pub async fn request(&self, kind: PredictionKind) -> Result<RequestOutcome, DashboardError> {
        {
            let mut inner = self.inner.lock();
            if let Some(PredictionState::Ready(result)) = inner.entries.get(&kind) {
                log::debug!("Predictions: {} served from cache", kind);
                return Ok(RequestOutcome::Cached(Arc::clone(result)));
            }
            if Self::mark_if_pending(&mut inner, kind) {
                return Ok(RequestOutcome::InFlight);
            }
        }
        self.fetch(kind).await
    }

    /// Explicit re-request: generate again even if a result is cached.
    pub async fn refresh(&self, kind: PredictionKind) -> Result<RequestOutcome, DashboardError> {
        if Self::mark_if_pending(&mut self.inner.lock(), kind) {
            return Ok(RequestOutcome::InFlight);
        }
        self.fetch(kind).await
    }

    /// A pending kind is not fetched twice; it only takes the loading slot.
    fn mark_if_pending(inner: &mut CacheInner, kind: PredictionKind) -> bool {
        let pending = matches!(
            inner.entries.get(&kind),
            Some(PredictionState::Pending { .. })
        );
        if pending {
            inner.loading = Some(kind);
        }
        pending
    }

    async fn fetch(&self, kind: PredictionKind) -> Result<RequestOutcome, DashboardError> {
        {
            let mut inner = self.inner.lock();
            let previous = inner.entries.get(&kind).and_then(PredictionState::result);
            inner
                .entries
                .insert(kind, PredictionState::Pending { previous });
            inner.loading = Some(kind);
        }

        let path = join_path(&self.base_path, kind.endpoint());
        log::info!("Predictions: generating {} via {}", kind, path);
        let result = self
            .api
            .get_json(&path, &[])
            .await
            .and_then(|json| PredictionResult::from_response(kind, json));

        let mut inner = self.inner.lock();
        if inner.loading == Some(kind) {
            inner.loading = None;
        }
        let previous = inner.entries.get(&kind).and_then(PredictionState::result);

        match result {
            Ok(result) => {
                let result = Arc::new(result);
                inner
                    .entries
                    .insert(kind, PredictionState::Ready(Arc::clone(&result)));
                log::info!("Predictions: {} ready", kind);
                Ok(RequestOutcome::Fetched(result))
            }
            Err(e) => {
                let err = DashboardError::PredictionFetch {
                    kind: kind.to_string(),
                    source: Box::new(e),
                };
                let restored = match previous {
                    Some(prev) => PredictionState::Ready(prev),
                    None => PredictionState::Failed(err.user_message()),
                };
                inner.entries.insert(kind, restored);
                drop(inner);

                log::warn!("Predictions: {}", err);
                self.notifier
                    .notify(Notification::error(&format!("Generating {} analysis", kind), &err));
                Err(err)
            }
        }
    }

    /// Whether the backend has insight generation enabled.
    pub async fn insights_status(&self) -> Result<InsightsStatus, DashboardError> {
        let path = join_path(&self.base_path, "ai/status");
        let json = self.api.get_json(&path, &[]).await?;
        serde_json::from_value(json).map_err(|e| DashboardError::Decode {
            path,
            message: e.to_string(),
        })
    }
}
