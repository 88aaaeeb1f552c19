use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use agrisk_core::{AlertId, NotificationId, UserId};

use crate::alert::Alert;

/// In-app message delivered to one user for one alert.
///
/// Immutable after creation except for `read_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    pub alert_id: AlertId,
    pub title: String,
    pub message: String,
    pub link: String,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

impl Notification {
    /// Build the notification a recipient receives when `alert` is sent.
    pub fn for_alert(alert: &Alert, user_id: UserId, at: DateTime<Utc>) -> Self {
        Self {
            id: NotificationId::new(),
            user_id,
            alert_id: alert.id(),
            title: alert.title().to_string(),
            message: alert.message().to_string(),
            link: alert.suggested_action_url().to_string(),
            created_at: at,
            read_at: None,
        }
    }

    pub fn is_read(&self) -> bool {
        self.read_at.is_some()
    }

    /// Mark as read. Returns `false` if it was already read; the first timestamp wins.
    pub fn mark_read(&mut self, at: DateTime<Utc>) -> bool {
        if self.read_at.is_some() {
            return false;
        }
        self.read_at = Some(at);
        true
    }
}
