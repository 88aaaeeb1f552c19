use tracing::{info, instrument};

use agrisk_alerts::{Alert, RecipientMode, SendRequest};
use agrisk_core::{AlertId, UserId};

use super::{AlertEngine, NotificationFanOut};
use crate::error::{EngineError, EngineResult};

impl AlertEngine {
    /// Resolve recipients, fan out notifications and mark the alert SENT.
    ///
    /// Notifications and the status change are committed together. Re-sending
    /// an alert that is no longer NEW is a conflict.
    #[instrument(skip(self, request), fields(alert_id = %alert_id, mode = request.mode().as_str()), err)]
    pub async fn send_alert(&self, alert_id: AlertId, request: SendRequest) -> EngineResult<Alert> {
        let mut alert = self
            .store
            .get(alert_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("alert {alert_id}")))?;
        let expected = alert.status();
        alert.ensure_sendable()?;

        let recipients = self.resolve_recipients(&alert, &request).await?;
        let now = self.clock.now();
        alert.mark_sent(recipients, now)?;

        let notifications = NotificationFanOut.notify(&alert, alert.recipient_farmer_ids(), now);
        self.store.commit_send(&alert, expected, &notifications).await?;

        info!(
            alert_id = %alert.id(),
            farm_id = %alert.farm_id(),
            channel = request.channel().as_str(),
            notifications = notifications.len(),
            "alert sent"
        );
        Ok(alert)
    }

    async fn resolve_recipients(&self, alert: &Alert, request: &SendRequest) -> EngineResult<Vec<UserId>> {
        match request.mode() {
            RecipientMode::AllFarmersInFarm => {
                let mut users = self.directory.farm_users(alert.farm_id()).await?;
                users.sort();
                users.dedup();
                Ok(users)
            }
            RecipientMode::SelectedFarmers => {
                let existing = self.directory.existing_users(request.selected()).await?;
                if existing.is_empty() {
                    return Err(EngineError::Validation(
                        "none of the selected recipients exist".to_string(),
                    ));
                }
                Ok(request
                    .selected()
                    .iter()
                    .filter(|id| existing.contains(id))
                    .copied()
                    .collect())
            }
        }
    }
}
