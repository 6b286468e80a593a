//! User-visible notifications
//!
//! Every failed operation surfaces exactly one notification. The desktop
//! shell is out of scope, so delivery goes through the [`Notifier`] trait;
//! [`LogNotifier`] writes to the log and [`RecordingNotifier`] keeps them in
//! memory for callers that render their own toasts.

use parking_lot::Mutex;
use serde::Serialize;

use crate::error::DashboardError;

const MAX_BODY_LEN: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
}

/// Serializable notification payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
}

impl Notification {
    pub fn error(operation: &str, err: &DashboardError) -> Self {
        Self {
            kind: NotificationKind::Error,
            title: format!("{} failed", operation),
            body: truncate_body(&err.user_message()),
        }
    }

    pub fn success(title: &str, body: &str) -> Self {
        Self {
            kind: NotificationKind::Success,
            title: title.to_string(),
            body: truncate_body(body),
        }
    }
}

fn truncate_body(body: &str) -> String {
    if body.chars().count() > MAX_BODY_LEN {
        let cut: String = body.chars().take(MAX_BODY_LEN).collect();
        format!("{}...", cut)
    } else {
        body.to_string()
    }
}

/// Sink for user-visible notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the log.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        match notification.kind {
            NotificationKind::Error => {
                log::error!("{}: {}", notification.title, notification.body)
            }
            NotificationKind::Success => {
                log::info!("{}: {}", notification.title, notification.body)
            }
        }
    }
}

/// Keeps every notification in memory, oldest first.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().clone()
    }

    pub fn errors(&self) -> Vec<Notification> {
        self.sent
            .lock()
            .iter()
            .filter(|n| n.kind == NotificationKind::Error)
            .cloned()
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.sent.lock().push(notification);
    }
}
