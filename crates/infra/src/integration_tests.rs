//! Integration tests for the full engine pipeline.
//!
//! Tests: Ledger + ReferenceData → On-hand → Risk → Refresh → AlertStore → Send → Inbox
//!
//! Verifies:
//! - Refresh is idempotent within a calendar day, including under concurrency
//! - One unreadable farm does not block the others
//! - Sending is all-or-nothing and cannot be repeated

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
    use rust_decimal::Decimal;

    use agrisk_alerts::{
        Alert, AlertStatus, AlertType, Channel, Notification, RecipientMode, SendRequest, Severity,
    };
    use agrisk_core::{AlertId, FarmId, ItemId, LotId, NotificationId, UserId, WarehouseId};
    use agrisk_inventory::{LotRef, MovementType, RiskFilter, StockMovement};

    use crate::clock::FixedClock;
    use crate::collaborators::InMemoryReferenceData;
    use crate::config::EngineConfig;
    use crate::error::{EngineError, StoreError};
    use crate::services::{AlertEngine, PageRequest};
    use crate::store::{AlertFilter, AlertStore, InMemoryAlertStore, InsertOutcome};

    struct Fixture {
        engine: AlertEngine,
        clock: Arc<FixedClock>,
        data: Arc<InMemoryReferenceData>,
        store: Arc<InMemoryAlertStore>,
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    fn today() -> NaiveDate {
        noon().date_naive()
    }

    fn setup() -> Fixture {
        let clock = Arc::new(FixedClock::new(noon()));
        let data = Arc::new(InMemoryReferenceData::new());
        let store = Arc::new(InMemoryAlertStore::new());
        let engine = AlertEngine::new(
            EngineConfig::default(),
            clock.clone(),
            data.clone(),
            data.clone(),
            data.clone(),
            store.clone(),
        );
        Fixture {
            engine,
            clock,
            data,
            store,
        }
    }

    /// Register a lot of `farm_name` expiring `days` from today and receive `qty` into it.
    fn stock_lot(data: &InMemoryReferenceData, farm_id: FarmId, farm_name: &str, days: i64, qty: i64) -> LotId {
        let lot_id = LotId::new();
        data.add_lot(LotRef {
            lot_id,
            farm_id,
            farm_name: farm_name.to_string(),
            item_id: ItemId::new(),
            item_name: format!("Seed {days}"),
            lot_code: format!("LOT-{days}"),
            expiry_date: Some(today() + Duration::days(days)),
            unit: "kg".to_string(),
        });
        data.record_movement(StockMovement {
            lot_id,
            warehouse_id: WarehouseId::new(),
            location_id: None,
            movement_type: MovementType::In,
            quantity: Decimal::from(qty),
            occurred_at: noon() - Duration::days(60),
        });
        lot_id
    }

    /// One farm with an expired lot (10) and lots expiring in 5 (4) and 40 (7) days.
    fn seed_farm(data: &InMemoryReferenceData, name: &str) -> FarmId {
        let farm_id = FarmId::new();
        data.add_farm(farm_id, name);
        stock_lot(data, farm_id, name, -1, 10);
        stock_lot(data, farm_id, name, 5, 4);
        stock_lot(data, farm_id, name, 40, 7);
        farm_id
    }

    async fn expired_alert(f: &Fixture, farm_id: FarmId) -> Alert {
        let report = f.engine.refresh(None).await.unwrap();
        report
            .alerts
            .into_iter()
            .map(|r| r.alert)
            .find(|a| a.farm_id() == farm_id && a.alert_type() == AlertType::InventoryExpired)
            .unwrap()
    }

    fn all_farmers() -> SendRequest {
        SendRequest::new(Channel::InApp, RecipientMode::AllFarmersInFarm, None).unwrap()
    }

    #[tokio::test]
    async fn summary_counts_expired_and_expiring_within_window() {
        let f = setup();
        let farm_id = seed_farm(&f.data, "North Field");

        let summary = f.engine.risk_summary(Some(30), Some(true), None).await.unwrap();
        assert_eq!(summary.expired_lots, 1);
        assert_eq!(summary.expiring_lots, 1);
        assert_eq!(summary.qty_at_risk, Decimal::from(14));
        assert_eq!(summary.farms.len(), 1);
        assert_eq!(summary.farms[0].farm_id, farm_id);

        let lots = f
            .engine
            .list_risk_lots(Some(farm_id), RiskFilter::Expiring, Some(30), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(lots.total, 1);
        assert_eq!(lots.items[0].on_hand, Decimal::from(4));
    }

    #[tokio::test]
    async fn refresh_creates_one_alert_per_type_and_reuses_them_on_rerun() {
        let f = setup();
        let farm_id = seed_farm(&f.data, "North Field");

        let first = f.engine.refresh(None).await.unwrap();
        assert_eq!(first.alerts.len(), 2);
        assert_eq!(first.created_count(), 2);
        assert!(first.failures.is_empty());

        let expired = first
            .alerts
            .iter()
            .find(|r| r.alert.alert_type() == AlertType::InventoryExpired)
            .unwrap();
        assert_eq!(expired.alert.severity(), Severity::High);
        assert_eq!(expired.alert.status(), AlertStatus::New);
        assert!(expired.alert.title().contains("North Field"));
        assert!(expired.alert.suggested_action_url().contains(&farm_id.to_string()));

        f.clock.advance(Duration::hours(3));
        let second = f.engine.refresh(None).await.unwrap();
        assert_eq!(second.created_count(), 0);

        let mut first_ids: Vec<AlertId> = first.alerts.iter().map(|r| r.alert.id()).collect();
        let mut second_ids: Vec<AlertId> = second.alerts.iter().map(|r| r.alert.id()).collect();
        first_ids.sort();
        second_ids.sort();
        assert_eq!(first_ids, second_ids);

        let stored = f.store.list(&AlertFilter::default()).await.unwrap();
        assert_eq!(stored.len(), 2);
    }

    #[tokio::test]
    async fn refresh_reuses_alert_even_after_it_was_resolved() {
        let f = setup();
        let farm_id = seed_farm(&f.data, "North Field");
        let alert = expired_alert(&f, farm_id).await;
        f.engine.resolve_alert(alert.id()).await.unwrap();

        let again = expired_alert(&f, farm_id).await;
        assert_eq!(again.id(), alert.id());
        assert_eq!(again.status(), AlertStatus::Resolved);
    }

    #[tokio::test]
    async fn next_day_opens_a_new_alert() {
        let f = setup();
        let farm_id = seed_farm(&f.data, "North Field");
        let yesterday = expired_alert(&f, farm_id).await;

        f.clock.advance(Duration::days(1));
        let report = f.engine.refresh(None).await.unwrap();
        assert_eq!(report.created_count(), 2);
        let today = report
            .alerts
            .iter()
            .find(|r| r.alert.alert_type() == AlertType::InventoryExpired)
            .unwrap();
        assert_ne!(today.alert.id(), yesterday.id());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_refreshes_never_duplicate_alerts() {
        let f = setup();
        seed_farm(&f.data, "North Field");
        seed_farm(&f.data, "South Field");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let engine = f.engine.clone();
                tokio::spawn(async move { engine.refresh(None).await })
            })
            .collect();

        let mut created = 0;
        for handle in handles {
            created += handle.await.unwrap().unwrap().created_count();
        }

        assert_eq!(created, 4);
        assert_eq!(f.store.list(&AlertFilter::default()).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn store_keeps_first_alert_for_a_taken_bucket() {
        let f = setup();
        let farm_id = seed_farm(&f.data, "North Field");
        let existing = expired_alert(&f, farm_id).await;

        let mut record = existing.to_record();
        record.id = AlertId::new();
        let racer = Alert::rehydrate(record).unwrap();
        let outcome = f.store.insert_if_absent(racer, today()).await.unwrap();
        assert_eq!(outcome, InsertOutcome::Existing(existing));
    }

    #[tokio::test]
    async fn unreadable_farm_is_reported_and_others_still_scanned() {
        let f = setup();
        let healthy = seed_farm(&f.data, "North Field");
        let broken = seed_farm(&f.data, "South Field");
        f.data.set_farm_unavailable(broken, true);

        let report = f.engine.refresh(None).await.unwrap();
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].farm_id, broken);
        assert_eq!(report.failures[0].farm_name, "South Field");
        assert_eq!(report.alerts.len(), 2);
        assert!(report.alerts.iter().all(|r| r.alert.farm_id() == healthy));
    }

    #[tokio::test]
    async fn farm_with_invalid_ledger_row_is_reported_and_others_still_scanned() {
        let f = setup();
        let healthy = seed_farm(&f.data, "North Field");
        let broken = seed_farm(&f.data, "South Field");
        let lot_id = stock_lot(&f.data, broken, "South Field", 3, 5);
        f.data.record_movement(StockMovement {
            lot_id,
            warehouse_id: WarehouseId::new(),
            location_id: None,
            movement_type: MovementType::Out,
            quantity: Decimal::from(-2),
            occurred_at: noon() - Duration::days(1),
        });

        let report = f.engine.refresh(None).await.unwrap();
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].farm_id, broken);
        assert_eq!(report.failures[0].farm_name, "South Field");
        assert_eq!(report.alerts.len(), 2);
        assert!(report.alerts.iter().all(|r| r.alert.farm_id() == healthy));

        let stored = f.store.list(&AlertFilter::default()).await.unwrap();
        assert!(stored.iter().all(|a| a.farm_id() == healthy));
    }

    #[tokio::test]
    async fn farm_without_risky_stock_gets_no_alert() {
        let f = setup();
        let farm_id = FarmId::new();
        f.data.add_farm(farm_id, "Quiet Acres");
        stock_lot(&f.data, farm_id, "Quiet Acres", 90, 25);

        let report = f.engine.refresh(None).await.unwrap();
        assert!(report.alerts.is_empty());
        assert!(report.failures.is_empty());
    }

    #[tokio::test]
    async fn send_notifies_every_farm_user_and_marks_sent() {
        let f = setup();
        let farm_id = seed_farm(&f.data, "North Field");
        let users = [UserId::new(), UserId::new(), UserId::new()];
        for u in users {
            f.data.add_farm_user(farm_id, u);
        }
        let alert = expired_alert(&f, farm_id).await;

        let sent = f.engine.send_alert(alert.id(), all_farmers()).await.unwrap();
        assert_eq!(sent.status(), AlertStatus::Sent);
        assert_eq!(sent.sent_at(), Some(noon()));
        assert_eq!(sent.recipient_farmer_ids().len(), 3);

        let notifications = f.engine.notifications_for_alert(alert.id()).await.unwrap();
        assert_eq!(notifications.len(), 3);
        for u in users {
            assert!(notifications.iter().any(|n| n.user_id == u && n.read_at.is_none()));
        }

        let err = f.engine.send_alert(alert.id(), all_farmers()).await.unwrap_err();
        assert!(matches!(err, EngineError::Conflict(_)));
        assert_eq!(f.engine.notifications_for_alert(alert.id()).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn send_to_farm_without_users_still_marks_sent() {
        let f = setup();
        let farm_id = seed_farm(&f.data, "North Field");
        let alert = expired_alert(&f, farm_id).await;

        let sent = f.engine.send_alert(alert.id(), all_farmers()).await.unwrap();
        assert_eq!(sent.status(), AlertStatus::Sent);
        assert!(f.engine.notifications_for_alert(alert.id()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn selected_farmers_drops_unknown_ids() {
        let f = setup();
        let farm_id = seed_farm(&f.data, "North Field");
        let known = UserId::new();
        f.data.add_user(known);
        let alert = expired_alert(&f, farm_id).await;

        let request = SendRequest::new(
            Channel::InApp,
            RecipientMode::SelectedFarmers,
            Some(vec![UserId::new(), known]),
        )
        .unwrap();
        let sent = f.engine.send_alert(alert.id(), request).await.unwrap();
        assert_eq!(sent.recipient_farmer_ids(), &[known]);

        let other = expired_alert(&f, seed_farm(&f.data, "South Field")).await;
        let unknown_only =
            SendRequest::new(Channel::InApp, RecipientMode::SelectedFarmers, Some(vec![UserId::new()]))
                .unwrap();
        let err = f.engine.send_alert(other.id(), unknown_only).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        assert_eq!(f.engine.get_alert(other.id()).await.unwrap().status(), AlertStatus::New);
    }

    #[tokio::test]
    async fn resend_is_a_conflict_before_recipients_are_resolved() {
        let f = setup();
        let farm_id = seed_farm(&f.data, "North Field");
        f.data.add_farm_user(farm_id, UserId::new());
        let alert = expired_alert(&f, farm_id).await;
        f.engine.send_alert(alert.id(), all_farmers()).await.unwrap();

        let unknown_only =
            SendRequest::new(Channel::InApp, RecipientMode::SelectedFarmers, Some(vec![UserId::new()]))
                .unwrap();
        let err = f.engine.send_alert(alert.id(), unknown_only).await.unwrap_err();
        assert!(matches!(err, EngineError::Conflict(_)));

        f.data.set_farm_unavailable(farm_id, true);
        let err = f.engine.send_alert(alert.id(), all_farmers()).await.unwrap_err();
        assert!(matches!(err, EngineError::Conflict(_)));

        let dismissed = expired_alert(&f, seed_farm(&f.data, "South Field")).await;
        f.engine.dismiss_alert(dismissed.id()).await.unwrap();
        let unknown_only =
            SendRequest::new(Channel::InApp, RecipientMode::SelectedFarmers, Some(vec![UserId::new()]))
                .unwrap();
        let err = f.engine.send_alert(dismissed.id(), unknown_only).await.unwrap_err();
        assert!(matches!(err, EngineError::Conflict(_)));
        assert_eq!(f.engine.notifications_for_alert(alert.id()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn send_unknown_alert_is_not_found() {
        let f = setup();
        let err = f.engine.send_alert(AlertId::new(), all_farmers()).await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    /// Delegates to an in-memory store but refuses every send commit.
    struct FailingCommitStore {
        inner: InMemoryAlertStore,
    }

    #[async_trait]
    impl AlertStore for FailingCommitStore {
        async fn get(&self, id: AlertId) -> Result<Option<Alert>, StoreError> {
            self.inner.get(id).await
        }

        async fn find_for_day(
            &self,
            farm_id: FarmId,
            alert_type: AlertType,
            day_start: DateTime<Utc>,
            day_end: DateTime<Utc>,
        ) -> Result<Option<Alert>, StoreError> {
            self.inner.find_for_day(farm_id, alert_type, day_start, day_end).await
        }

        async fn insert_if_absent(&self, alert: Alert, dedup_date: NaiveDate) -> Result<InsertOutcome, StoreError> {
            self.inner.insert_if_absent(alert, dedup_date).await
        }

        async fn list(&self, filter: &AlertFilter) -> Result<Vec<Alert>, StoreError> {
            self.inner.list(filter).await
        }

        async fn save_transition(&self, alert: &Alert, expected: AlertStatus) -> Result<(), StoreError> {
            self.inner.save_transition(alert, expected).await
        }

        async fn commit_send(
            &self,
            _alert: &Alert,
            _expected: AlertStatus,
            _notifications: &[Notification],
        ) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("connection reset".to_string()))
        }

        async fn notifications_for_alert(&self, alert_id: AlertId) -> Result<Vec<Notification>, StoreError> {
            self.inner.notifications_for_alert(alert_id).await
        }

        async fn notifications_for_user(
            &self,
            user_id: UserId,
            unread_only: bool,
        ) -> Result<Vec<Notification>, StoreError> {
            self.inner.notifications_for_user(user_id, unread_only).await
        }

        async fn mark_notification_read(
            &self,
            id: NotificationId,
            user_id: UserId,
            at: DateTime<Utc>,
        ) -> Result<Notification, StoreError> {
            self.inner.mark_notification_read(id, user_id, at).await
        }
    }

    #[tokio::test]
    async fn failed_send_commit_leaves_alert_new_without_notifications() {
        let clock = Arc::new(FixedClock::new(noon()));
        let data = Arc::new(InMemoryReferenceData::new());
        let store = Arc::new(FailingCommitStore {
            inner: InMemoryAlertStore::new(),
        });
        let engine = AlertEngine::new(
            EngineConfig::default(),
            clock,
            data.clone(),
            data.clone(),
            data.clone(),
            store,
        );
        let farm_id = seed_farm(&data, "North Field");
        data.add_farm_user(farm_id, UserId::new());

        let report = engine.refresh(None).await.unwrap();
        let alert_id = report.alerts[0].alert.id();

        let err = engine.send_alert(alert_id, all_farmers()).await.unwrap_err();
        assert!(matches!(err, EngineError::Store(StoreError::Unavailable(_))));
        assert_eq!(engine.get_alert(alert_id).await.unwrap().status(), AlertStatus::New);
        assert!(engine.notifications_for_alert(alert_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn lifecycle_transitions_follow_status_rules() {
        let f = setup();
        let farm_id = seed_farm(&f.data, "North Field");
        let alert = expired_alert(&f, farm_id).await;

        f.clock.advance(Duration::minutes(5));
        let acked = f.engine.acknowledge_alert(alert.id()).await.unwrap();
        assert_eq!(acked.status(), AlertStatus::Acknowledged);
        assert_eq!(acked.updated_at(), noon() + Duration::minutes(5));

        let err = f.engine.acknowledge_alert(alert.id()).await.unwrap_err();
        assert!(matches!(err, EngineError::Conflict(_)));

        let err = f.engine.send_alert(alert.id(), all_farmers()).await.unwrap_err();
        assert!(matches!(err, EngineError::Conflict(_)));

        let resolved = f.engine.resolve_alert(alert.id()).await.unwrap();
        assert_eq!(resolved.status(), AlertStatus::Resolved);

        let err = f.engine.dismiss_alert(alert.id()).await.unwrap_err();
        assert!(matches!(err, EngineError::Conflict(_)));

        let listed = f
            .engine
            .list_alerts(
                AlertFilter {
                    status: Some(AlertStatus::Resolved),
                    ..AlertFilter::default()
                },
                PageRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(listed.total, 1);
        assert_eq!(listed.items[0].id(), alert.id());
    }

    #[tokio::test]
    async fn inbox_read_flow_is_scoped_to_owner() {
        let f = setup();
        let farm_id = seed_farm(&f.data, "North Field");
        let alice = UserId::new();
        let bob = UserId::new();
        f.data.add_farm_user(farm_id, alice);
        f.data.add_farm_user(farm_id, bob);
        let alert = expired_alert(&f, farm_id).await;
        f.engine.send_alert(alert.id(), all_farmers()).await.unwrap();

        let inbox = f
            .engine
            .notifications_for_user(alice, true, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(inbox.total, 1);
        let note = inbox.items[0].clone();

        let err = f.engine.mark_notification_read(note.id, bob).await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));

        f.clock.advance(Duration::minutes(1));
        let read = f.engine.mark_notification_read(note.id, alice).await.unwrap();
        assert_eq!(read.read_at, Some(noon() + Duration::minutes(1)));

        f.clock.advance(Duration::minutes(1));
        let again = f.engine.mark_notification_read(note.id, alice).await.unwrap();
        assert_eq!(again.read_at, read.read_at);

        let unread = f
            .engine
            .notifications_for_user(alice, true, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(unread.total, 0);
        let all = f
            .engine
            .notifications_for_user(alice, false, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(all.total, 1);
    }
}
