//! Alert Store: the single authoritative owner of alert and notification state.
//!
//! All alert mutation goes through this trait. Implementations must make the
//! dedup create and the send commit atomic with respect to concurrent callers.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use agrisk_alerts::{Alert, AlertStatus, AlertType, Notification};
use agrisk_core::{AlertId, FarmId, NotificationId, UserId};

use crate::error::StoreError;

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryAlertStore;
pub use postgres::PostgresAlertStore;

/// Result of a dedup-guarded insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Created(Alert),
    /// Another alert already holds the `(farm, type, day)` bucket.
    Existing(Alert),
}

impl InsertOutcome {
    pub fn created(&self) -> bool {
        matches!(self, InsertOutcome::Created(_))
    }

    pub fn into_alert(self) -> Alert {
        match self {
            InsertOutcome::Created(a) | InsertOutcome::Existing(a) => a,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertFilter {
    pub farm_id: Option<FarmId>,
    pub status: Option<AlertStatus>,
    pub alert_type: Option<AlertType>,
}

impl AlertFilter {
    pub fn matches(&self, alert: &Alert) -> bool {
        self.farm_id.is_none_or(|f| alert.farm_id() == f)
            && self.status.is_none_or(|s| alert.status() == s)
            && self.alert_type.is_none_or(|t| alert.alert_type() == t)
    }
}

#[async_trait]
pub trait AlertStore: Send + Sync {
    async fn get(&self, id: AlertId) -> Result<Option<Alert>, StoreError>;

    /// Alert for `(farm, type)` created within `[day_start, day_end)`, any status.
    async fn find_for_day(
        &self,
        farm_id: FarmId,
        alert_type: AlertType,
        day_start: DateTime<Utc>,
        day_end: DateTime<Utc>,
    ) -> Result<Option<Alert>, StoreError>;

    /// Insert `alert` unless its `(farm, type, dedup_date)` bucket is taken, in
    /// which case the existing alert is returned untouched.
    async fn insert_if_absent(
        &self,
        alert: Alert,
        dedup_date: NaiveDate,
    ) -> Result<InsertOutcome, StoreError>;

    /// Newest first.
    async fn list(&self, filter: &AlertFilter) -> Result<Vec<Alert>, StoreError>;

    /// Persist a status transition, provided the stored status is still `expected`.
    async fn save_transition(&self, alert: &Alert, expected: AlertStatus) -> Result<(), StoreError>;

    /// Atomically persist `alert` (already marked SENT) and its notifications.
    ///
    /// Either both are committed or neither is; fails with `Conflict` if the
    /// stored status is no longer `expected`.
    async fn commit_send(
        &self,
        alert: &Alert,
        expected: AlertStatus,
        notifications: &[Notification],
    ) -> Result<(), StoreError>;

    async fn notifications_for_alert(&self, alert_id: AlertId) -> Result<Vec<Notification>, StoreError>;

    /// Newest first.
    async fn notifications_for_user(
        &self,
        user_id: UserId,
        unread_only: bool,
    ) -> Result<Vec<Notification>, StoreError>;

    /// Set `read_at` once. A notification owned by another user is `NotFound`.
    async fn mark_notification_read(
        &self,
        id: NotificationId,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> Result<Notification, StoreError>;
}
