use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use agrisk_alerts::{Alert, AlertStatus, AlertType, Notification};
use agrisk_core::{AlertId, FarmId, NotificationId, UserId};

use super::{AlertFilter, AlertStore, InsertOutcome};
use crate::error::StoreError;

type DedupKey = (FarmId, AlertType, NaiveDate);

#[derive(Debug, Default)]
struct State {
    alerts: HashMap<AlertId, Alert>,
    dedup: HashMap<DedupKey, AlertId>,
    notifications: HashMap<NotificationId, Notification>,
}

/// In-memory Alert Store for tests/dev.
///
/// One lock guards alerts, the dedup index and notifications, so a dedup
/// lookup-then-insert and a send commit are each a single critical section.
#[derive(Debug, Default)]
pub struct InMemoryAlertStore {
    inner: RwLock<State>,
}

impl InMemoryAlertStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::Unavailable("alert store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::Unavailable("alert store lock poisoned".to_string()))
    }
}

fn check_status(state: &State, alert: &Alert, expected: AlertStatus) -> Result<(), StoreError> {
    let stored = state
        .alerts
        .get(&alert.id())
        .ok_or_else(|| StoreError::NotFound(format!("alert {}", alert.id())))?;
    if stored.status() != expected {
        return Err(StoreError::Conflict(format!(
            "alert {} is {}, expected {}",
            alert.id(),
            stored.status().as_str(),
            expected.as_str()
        )));
    }
    Ok(())
}

fn newest_first<T, F>(items: &mut [T], key: F)
where
    F: Fn(&T) -> (DateTime<Utc>, uuid::Uuid),
{
    items.sort_by(|a, b| key(b).cmp(&key(a)));
}

#[async_trait]
impl AlertStore for InMemoryAlertStore {
    async fn get(&self, id: AlertId) -> Result<Option<Alert>, StoreError> {
        Ok(self.read()?.alerts.get(&id).cloned())
    }

    async fn find_for_day(
        &self,
        farm_id: FarmId,
        alert_type: AlertType,
        day_start: DateTime<Utc>,
        day_end: DateTime<Utc>,
    ) -> Result<Option<Alert>, StoreError> {
        let state = self.read()?;
        Ok(state
            .alerts
            .values()
            .filter(|a| a.farm_id() == farm_id && a.alert_type() == alert_type)
            .filter(|a| a.created_at() >= day_start && a.created_at() < day_end)
            .min_by_key(|a| (a.created_at(), a.id()))
            .cloned())
    }

    async fn insert_if_absent(
        &self,
        alert: Alert,
        dedup_date: NaiveDate,
    ) -> Result<InsertOutcome, StoreError> {
        let mut state = self.write()?;
        let key = (alert.farm_id(), alert.alert_type(), dedup_date);
        if let Some(existing_id) = state.dedup.get(&key) {
            let existing = state.alerts.get(existing_id).cloned().ok_or_else(|| {
                StoreError::Corrupt(format!("dedup index points at missing alert {existing_id}"))
            })?;
            return Ok(InsertOutcome::Existing(existing));
        }
        if state.alerts.contains_key(&alert.id()) {
            return Err(StoreError::Conflict(format!("alert {} already exists", alert.id())));
        }
        state.dedup.insert(key, alert.id());
        state.alerts.insert(alert.id(), alert.clone());
        Ok(InsertOutcome::Created(alert))
    }

    async fn list(&self, filter: &AlertFilter) -> Result<Vec<Alert>, StoreError> {
        let state = self.read()?;
        let mut alerts: Vec<Alert> = state
            .alerts
            .values()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect();
        newest_first(&mut alerts, |a| (a.created_at(), *a.id().as_uuid()));
        Ok(alerts)
    }

    async fn save_transition(&self, alert: &Alert, expected: AlertStatus) -> Result<(), StoreError> {
        let mut state = self.write()?;
        check_status(&state, alert, expected)?;
        state.alerts.insert(alert.id(), alert.clone());
        Ok(())
    }

    async fn commit_send(
        &self,
        alert: &Alert,
        expected: AlertStatus,
        notifications: &[Notification],
    ) -> Result<(), StoreError> {
        let mut state = self.write()?;
        check_status(&state, alert, expected)?;
        if let Some(dup) = notifications.iter().find(|n| state.notifications.contains_key(&n.id)) {
            return Err(StoreError::Conflict(format!("notification {} already exists", dup.id)));
        }
        for n in notifications {
            state.notifications.insert(n.id, n.clone());
        }
        state.alerts.insert(alert.id(), alert.clone());
        Ok(())
    }

    async fn notifications_for_alert(&self, alert_id: AlertId) -> Result<Vec<Notification>, StoreError> {
        let state = self.read()?;
        let mut out: Vec<Notification> = state
            .notifications
            .values()
            .filter(|n| n.alert_id == alert_id)
            .cloned()
            .collect();
        newest_first(&mut out, |n| (n.created_at, *n.id.as_uuid()));
        Ok(out)
    }

    async fn notifications_for_user(
        &self,
        user_id: UserId,
        unread_only: bool,
    ) -> Result<Vec<Notification>, StoreError> {
        let state = self.read()?;
        let mut out: Vec<Notification> = state
            .notifications
            .values()
            .filter(|n| n.user_id == user_id && (!unread_only || !n.is_read()))
            .cloned()
            .collect();
        newest_first(&mut out, |n| (n.created_at, *n.id.as_uuid()));
        Ok(out)
    }

    async fn mark_notification_read(
        &self,
        id: NotificationId,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> Result<Notification, StoreError> {
        let mut state = self.write()?;
        let n = state
            .notifications
            .get_mut(&id)
            .filter(|n| n.user_id == user_id)
            .ok_or_else(|| StoreError::NotFound(format!("notification {id}")))?;
        n.mark_read(at);
        Ok(n.clone())
    }
}
