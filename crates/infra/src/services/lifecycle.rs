use chrono::{DateTime, Utc};
use tracing::{info, instrument};

use agrisk_alerts::{Alert, Notification};
use agrisk_core::{AlertId, DomainResult, NotificationId, UserId};

use super::{AlertEngine, Page, PageRequest};
use crate::error::{EngineError, EngineResult};
use crate::store::AlertFilter;

impl AlertEngine {
    #[instrument(skip(self), err)]
    pub async fn get_alert(&self, alert_id: AlertId) -> EngineResult<Alert> {
        self.store
            .get(alert_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("alert {alert_id}")))
    }

    /// Alerts matching `filter`, newest first.
    #[instrument(skip(self), err)]
    pub async fn list_alerts(&self, filter: AlertFilter, page: PageRequest) -> EngineResult<Page<Alert>> {
        let alerts = self.store.list(&filter).await?;
        Ok(Page::from_vec(alerts, page))
    }

    pub async fn acknowledge_alert(&self, alert_id: AlertId) -> EngineResult<Alert> {
        self.transition(alert_id, "acknowledged", Alert::acknowledge).await
    }

    pub async fn resolve_alert(&self, alert_id: AlertId) -> EngineResult<Alert> {
        self.transition(alert_id, "resolved", Alert::resolve).await
    }

    pub async fn dismiss_alert(&self, alert_id: AlertId) -> EngineResult<Alert> {
        self.transition(alert_id, "dismissed", Alert::dismiss).await
    }

    #[instrument(skip(self, apply), err)]
    async fn transition<F>(&self, alert_id: AlertId, action: &'static str, apply: F) -> EngineResult<Alert>
    where
        F: FnOnce(&mut Alert, DateTime<Utc>) -> DomainResult<()> + Send,
    {
        let mut alert = self.get_alert(alert_id).await?;
        let expected = alert.status();
        apply(&mut alert, self.clock.now())?;
        self.store.save_transition(&alert, expected).await?;

        info!(alert_id = %alert_id, from = expected.as_str(), to = alert.status().as_str(), "alert {action}");
        Ok(alert)
    }

    /// Notifications produced by sending `alert_id`. Unknown alerts are `NotFound`.
    #[instrument(skip(self), err)]
    pub async fn notifications_for_alert(&self, alert_id: AlertId) -> EngineResult<Vec<Notification>> {
        self.get_alert(alert_id).await?;
        Ok(self.store.notifications_for_alert(alert_id).await?)
    }

    /// A user's inbox, newest first.
    #[instrument(skip(self), err)]
    pub async fn notifications_for_user(
        &self,
        user_id: UserId,
        unread_only: bool,
        page: PageRequest,
    ) -> EngineResult<Page<Notification>> {
        let items = self.store.notifications_for_user(user_id, unread_only).await?;
        Ok(Page::from_vec(items, page))
    }

    /// Mark one of `user_id`'s notifications read. Repeat calls keep the first timestamp.
    #[instrument(skip(self), err)]
    pub async fn mark_notification_read(
        &self,
        notification_id: NotificationId,
        user_id: UserId,
    ) -> EngineResult<Notification> {
        Ok(self
            .store
            .mark_notification_read(notification_id, user_id, self.clock.now())
            .await?)
    }
}
