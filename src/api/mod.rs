//! Backend transport.
//!
//! The orchestration layer only talks to [`MetricsApi`]; [`client::ApiClient`]
//! is the reqwest implementation used in production.

pub mod client;

use async_trait::async_trait;

use crate::error::DashboardError;

/// Read/trigger access to the metrics backend. Paths are absolute from the
/// API root (e.g. `/api/apaar/overview`).
#[async_trait]
pub trait MetricsApi: Send + Sync {
    async fn get_json(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<serde_json::Value, DashboardError>;

    /// POST with no body. Success only confirms the server accepted the call.
    async fn post_empty(&self, path: &str) -> Result<(), DashboardError>;
}

/// Read an optional bearer token from the environment.
///
/// A missing or blank variable is not an error: requests go out unauthenticated.
pub fn credential_from_env(var_name: &str) -> Option<String> {
    std::env::var(var_name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
pub(crate) mod fake {
    //! In-memory backend for orchestration tests.

    use std::collections::{HashMap, VecDeque};
    use std::time::Duration;

    use parking_lot::Mutex;

    use super::*;

    #[derive(Clone)]
    enum Reply {
        Json(serde_json::Value),
        Fail(DashboardError),
    }

    /// Scripted replies keyed by path, queued one-shot delays and a call log.
    #[derive(Default)]
    pub struct FakeApi {
        replies: Mutex<HashMap<String, Reply>>,
        delays: Mutex<HashMap<String, VecDeque<Duration>>>,
        one_shot_failures: Mutex<HashMap<String, VecDeque<DashboardError>>>,
        calls: Mutex<Vec<String>>,
        queries: Mutex<Vec<Vec<(String, String)>>>,
    }

    impl FakeApi {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn reply(&self, path: &str, body: serde_json::Value) {
            self.replies.lock().insert(path.to_string(), Reply::Json(body));
        }

        pub fn fail(&self, path: &str, err: DashboardError) {
            self.replies.lock().insert(path.to_string(), Reply::Fail(err));
        }

        /// Delay the next call to `path` only.
        pub fn delay(&self, path: &str, delay: Duration) {
            self.delays
                .lock()
                .entry(path.to_string())
                .or_default()
                .push_back(delay);
        }

        /// Fail the next call to `path` only; later calls use the scripted reply.
        pub fn fail_next(&self, path: &str, err: DashboardError) {
            self.one_shot_failures
                .lock()
                .entry(path.to_string())
                .or_default()
                .push_back(err);
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }

        pub fn queries(&self) -> Vec<Vec<(String, String)>> {
            self.queries.lock().clone()
        }

        pub fn call_count(&self, path: &str) -> usize {
            self.calls.lock().iter().filter(|c| c.as_str() == path).count()
        }

        async fn answer(&self, path: &str) -> Result<serde_json::Value, DashboardError> {
            self.calls.lock().push(path.to_string());
            let one_shot = self
                .one_shot_failures
                .lock()
                .get_mut(path)
                .and_then(|queue| queue.pop_front());
            let delay = self
                .delays
                .lock()
                .get_mut(path)
                .and_then(|queue| queue.pop_front());
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(err) = one_shot {
                return Err(err);
            }
            let reply = self.replies.lock().get(path).cloned();
            match reply {
                Some(Reply::Json(v)) => Ok(v),
                Some(Reply::Fail(e)) => Err(e),
                None => Err(DashboardError::Status {
                    status: 404,
                    detail: Some(format!("Not Found: {}", path)),
                }),
            }
        }
    }

    #[async_trait]
    impl MetricsApi for FakeApi {
        async fn get_json(
            &self,
            path: &str,
            query: &[(&str, &str)],
        ) -> Result<serde_json::Value, DashboardError> {
            self.queries.lock().push(
                query
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            );
            self.answer(path).await
        }

        async fn post_empty(&self, path: &str) -> Result<(), DashboardError> {
            self.answer(path).await.map(|_| ())
        }
    }
}
