use chrono::{DateTime, Utc};

use agrisk_alerts::{Alert, Notification};
use agrisk_core::UserId;

/// Turns one alert into one notification per recipient.
///
/// Building is pure; the batch is persisted together with the alert's SENT
/// transition by `AlertStore::commit_send`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NotificationFanOut;

impl NotificationFanOut {
    pub fn notify(&self, alert: &Alert, recipients: &[UserId], at: DateTime<Utc>) -> Vec<Notification> {
        recipients
            .iter()
            .map(|user_id| Notification::for_alert(alert, *user_id, at))
            .collect()
    }
}
