//! Postgres-backed Alert Store.
//!
//! Dedup is enforced by `UNIQUE (farm_id, alert_type, dedup_date)`: creation is
//! `INSERT ... ON CONFLICT DO NOTHING RETURNING id`, falling back to reading the
//! row that won the race. A send runs in one transaction that locks the alert
//! row, batch-inserts notifications and updates the status, so a failure leaves
//! the alert in its previous state.
//!
//! ## Error Mapping
//!
//! | SQLx error | Postgres code | StoreError |
//! |------------|---------------|------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (other) | any | `Unavailable` |
//! | Decode / ColumnDecode | n/a | `Corrupt` |
//! | PoolClosed, Io, other | n/a | `Unavailable` |

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row, Transaction};
use tracing::{instrument, Span};
use uuid::Uuid;

use agrisk_alerts::{Alert, AlertRecord, AlertStatus, AlertType, Notification};
use agrisk_core::{AlertId, FarmId, NotificationId, UserId};

use super::{AlertFilter, AlertStore, InsertOutcome};
use crate::error::StoreError;

const ALERT_COLUMNS: &str = r#"
    id, alert_type, severity, status, farm_id, season_id, plot_id, crop_id,
    title, message, suggested_action_type, suggested_action_url,
    recipient_farmer_ids, created_at, updated_at, sent_at
"#;

const NOTIFICATION_COLUMNS: &str =
    "id, user_id, alert_id, title, message, link, created_at, read_at";

#[derive(Debug, Clone)]
pub struct PostgresAlertStore {
    pool: Arc<PgPool>,
}

impl PostgresAlertStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Apply the embedded schema migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&*self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(format!("migration failed: {e}")))
    }

    async fn select_alert(&self, id: AlertId) -> Result<Option<Alert>, StoreError> {
        let row = sqlx::query(&format!("SELECT {ALERT_COLUMNS} FROM alerts WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("select_alert", e))?;
        row.as_ref().map(alert_from_row).transpose()
    }
}

#[async_trait]
impl AlertStore for PostgresAlertStore {
    #[instrument(skip(self), fields(alert_id = %id), err)]
    async fn get(&self, id: AlertId) -> Result<Option<Alert>, StoreError> {
        self.select_alert(id).await
    }

    #[instrument(skip(self), fields(farm_id = %farm_id, alert_type = alert_type.as_str()), err)]
    async fn find_for_day(
        &self,
        farm_id: FarmId,
        alert_type: AlertType,
        day_start: DateTime<Utc>,
        day_end: DateTime<Utc>,
    ) -> Result<Option<Alert>, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {ALERT_COLUMNS}
            FROM alerts
            WHERE farm_id = $1
              AND alert_type = $2
              AND created_at >= $3
              AND created_at < $4
            ORDER BY created_at ASC, id ASC
            LIMIT 1
            "#
        ))
        .bind(farm_id.as_uuid())
        .bind(alert_type.as_str())
        .bind(day_start)
        .bind(day_end)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_for_day", e))?;

        row.as_ref().map(alert_from_row).transpose()
    }

    #[instrument(
        skip(self, alert),
        fields(
            alert_id = %alert.id(),
            farm_id = %alert.farm_id(),
            alert_type = alert.alert_type().as_str(),
            created = tracing::field::Empty
        ),
        err
    )]
    async fn insert_if_absent(
        &self,
        alert: Alert,
        dedup_date: NaiveDate,
    ) -> Result<InsertOutcome, StoreError> {
        let recipients = recipients_json(&alert)?;
        let inserted = sqlx::query(
            r#"
            INSERT INTO alerts (
                id, alert_type, severity, status, farm_id, season_id, plot_id, crop_id,
                title, message, suggested_action_type, suggested_action_url,
                recipient_farmer_ids, dedup_date, created_at, updated_at, sent_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            ON CONFLICT (farm_id, alert_type, dedup_date) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(alert.id().as_uuid())
        .bind(alert.alert_type().as_str())
        .bind(alert.severity().as_str())
        .bind(alert.status().as_str())
        .bind(alert.farm_id().as_uuid())
        .bind(alert.season_id().map(Uuid::from))
        .bind(alert.plot_id().map(Uuid::from))
        .bind(alert.crop_id().map(Uuid::from))
        .bind(alert.title())
        .bind(alert.message())
        .bind(alert.suggested_action_type())
        .bind(alert.suggested_action_url())
        .bind(&recipients)
        .bind(dedup_date)
        .bind(alert.created_at())
        .bind(alert.updated_at())
        .bind(alert.sent_at())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_alert", e))?;

        let span = Span::current();
        if inserted.is_some() {
            span.record("created", true);
            return Ok(InsertOutcome::Created(alert));
        }
        span.record("created", false);

        let row = sqlx::query(&format!(
            r#"
            SELECT {ALERT_COLUMNS}
            FROM alerts
            WHERE farm_id = $1 AND alert_type = $2 AND dedup_date = $3
            "#
        ))
        .bind(alert.farm_id().as_uuid())
        .bind(alert.alert_type().as_str())
        .bind(dedup_date)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("select_dedup_winner", e))?;

        match row {
            Some(row) => Ok(InsertOutcome::Existing(alert_from_row(&row)?)),
            None => Err(StoreError::Conflict(format!(
                "dedup bucket for farm {} on {} was taken but the alert is gone",
                alert.farm_id(),
                dedup_date
            ))),
        }
    }

    #[instrument(skip(self), err)]
    async fn list(&self, filter: &AlertFilter) -> Result<Vec<Alert>, StoreError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {ALERT_COLUMNS}
            FROM alerts
            WHERE ($1::uuid IS NULL OR farm_id = $1)
              AND ($2::text IS NULL OR status = $2)
              AND ($3::text IS NULL OR alert_type = $3)
            ORDER BY created_at DESC, id DESC
            "#
        ))
        .bind(filter.farm_id.map(Uuid::from))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.alert_type.map(|t| t.as_str()))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_alerts", e))?;

        rows.iter().map(alert_from_row).collect()
    }

    #[instrument(skip(self, alert), fields(alert_id = %alert.id(), to = alert.status().as_str()), err)]
    async fn save_transition(&self, alert: &Alert, expected: AlertStatus) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE alerts
            SET status = $2, updated_at = $3
            WHERE id = $1 AND status = $4
            "#,
        )
        .bind(alert.id().as_uuid())
        .bind(alert.status().as_str())
        .bind(alert.updated_at())
        .bind(expected.as_str())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("save_transition", e))?;

        if result.rows_affected() == 1 {
            return Ok(());
        }
        match self.select_alert(alert.id()).await? {
            None => Err(StoreError::NotFound(format!("alert {}", alert.id()))),
            Some(current) => Err(StoreError::Conflict(format!(
                "alert {} is {}, expected {}",
                alert.id(),
                current.status().as_str(),
                expected.as_str()
            ))),
        }
    }

    #[instrument(
        skip(self, alert, notifications),
        fields(alert_id = %alert.id(), notification_count = notifications.len()),
        err
    )]
    async fn commit_send(
        &self,
        alert: &Alert,
        expected: AlertStatus,
        notifications: &[Notification],
    ) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        lock_with_status(&mut tx, alert.id(), expected).await?;

        if !notifications.is_empty() {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
                "INSERT INTO notifications ({NOTIFICATION_COLUMNS}) "
            ));
            builder.push_values(notifications, |mut b, n| {
                b.push_bind(*n.id.as_uuid())
                    .push_bind(*n.user_id.as_uuid())
                    .push_bind(*n.alert_id.as_uuid())
                    .push_bind(n.title.clone())
                    .push_bind(n.message.clone())
                    .push_bind(n.link.clone())
                    .push_bind(n.created_at)
                    .push_bind(n.read_at);
            });
            builder
                .build()
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("insert_notifications", e))?;
        }

        sqlx::query(
            r#"
            UPDATE alerts
            SET status = $2, recipient_farmer_ids = $3, sent_at = $4, updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(alert.id().as_uuid())
        .bind(alert.status().as_str())
        .bind(recipients_json(alert)?)
        .bind(alert.sent_at())
        .bind(alert.updated_at())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_alert_sent", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(alert_id = %alert_id), err)]
    async fn notifications_for_alert(&self, alert_id: AlertId) -> Result<Vec<Notification>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE alert_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(alert_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("notifications_for_alert", e))?;

        rows.iter().map(notification_from_row).collect()
    }

    #[instrument(skip(self), fields(user_id = %user_id), err)]
    async fn notifications_for_user(
        &self,
        user_id: UserId,
        unread_only: bool,
    ) -> Result<Vec<Notification>, StoreError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {NOTIFICATION_COLUMNS}
            FROM notifications
            WHERE user_id = $1 AND (NOT $2 OR read_at IS NULL)
            ORDER BY created_at DESC, id DESC
            "#
        ))
        .bind(user_id.as_uuid())
        .bind(unread_only)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("notifications_for_user", e))?;

        rows.iter().map(notification_from_row).collect()
    }

    #[instrument(skip(self), fields(notification_id = %id, user_id = %user_id), err)]
    async fn mark_notification_read(
        &self,
        id: NotificationId,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> Result<Notification, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE notifications
            SET read_at = COALESCE(read_at, $3)
            WHERE id = $1 AND user_id = $2
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .bind(user_id.as_uuid())
        .bind(at)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("mark_notification_read", e))?;

        match row {
            Some(row) => notification_from_row(&row),
            None => Err(StoreError::NotFound(format!("notification {id}"))),
        }
    }
}

/// Lock the alert row for the rest of `tx` and check its status.
async fn lock_with_status(
    tx: &mut Transaction<'_, Postgres>,
    id: AlertId,
    expected: AlertStatus,
) -> Result<(), StoreError> {
    let row = sqlx::query("SELECT status FROM alerts WHERE id = $1 FOR UPDATE")
        .bind(id.as_uuid())
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("lock_alert", e))?;

    let Some(row) = row else {
        return Err(StoreError::NotFound(format!("alert {id}")));
    };
    let status: AlertStatus = parse_column(&row, "status")?;
    if status != expected {
        return Err(StoreError::Conflict(format!(
            "alert {id} is {}, expected {}",
            status.as_str(),
            expected.as_str()
        )));
    }
    Ok(())
}

fn recipients_json(alert: &Alert) -> Result<serde_json::Value, StoreError> {
    serde_json::to_value(alert.recipient_farmer_ids())
        .map_err(|e| StoreError::Corrupt(format!("recipient list serialization failed: {e}")))
}

fn alert_from_row(row: &PgRow) -> Result<Alert, StoreError> {
    let recipients: serde_json::Value = get(row, "recipient_farmer_ids")?;
    let recipient_farmer_ids: Vec<UserId> = serde_json::from_value(recipients)
        .map_err(|e| StoreError::Corrupt(format!("alerts.recipient_farmer_ids: {e}")))?;

    let record = AlertRecord {
        id: get::<Uuid>(row, "id")?.into(),
        alert_type: parse_column(row, "alert_type")?,
        severity: parse_column(row, "severity")?,
        status: parse_column(row, "status")?,
        farm_id: get::<Uuid>(row, "farm_id")?.into(),
        season_id: get::<Option<Uuid>>(row, "season_id")?.map(Into::into),
        plot_id: get::<Option<Uuid>>(row, "plot_id")?.map(Into::into),
        crop_id: get::<Option<Uuid>>(row, "crop_id")?.map(Into::into),
        title: get(row, "title")?,
        message: get(row, "message")?,
        suggested_action_type: get(row, "suggested_action_type")?,
        suggested_action_url: get(row, "suggested_action_url")?,
        recipient_farmer_ids,
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
        sent_at: get(row, "sent_at")?,
    };
    Ok(Alert::rehydrate(record)?)
}

fn notification_from_row(row: &PgRow) -> Result<Notification, StoreError> {
    Ok(Notification {
        id: get::<Uuid>(row, "id")?.into(),
        user_id: get::<Uuid>(row, "user_id")?.into(),
        alert_id: get::<Uuid>(row, "alert_id")?.into(),
        title: get(row, "title")?,
        message: get(row, "message")?,
        link: get(row, "link")?,
        created_at: get(row, "created_at")?,
        read_at: get(row, "read_at")?,
    })
}

fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(column)
        .map_err(|e| StoreError::Corrupt(format!("failed to read column {column}: {e}")))
}

fn parse_column<T>(row: &PgRow, column: &str) -> Result<T, StoreError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw: String = get(row, column)?;
    raw.parse()
        .map_err(|e| StoreError::Corrupt(format!("column {column}: {e}")))
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(msg),
                _ => StoreError::Unavailable(msg),
            }
        }
        sqlx::Error::RowNotFound => {
            StoreError::NotFound(format!("unexpected row not found in {operation}"))
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::ColumnNotFound(_) => {
            StoreError::Corrupt(format!("decode error in {operation}: {err}"))
        }
        other => StoreError::Unavailable(format!("sqlx error in {operation}: {other}")),
    }
}
