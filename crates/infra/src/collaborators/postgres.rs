//! Postgres-backed collaborators reading `farms`, `items`, `lots`,
//! `stock_movements`, `farm_users` and `users`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use agrisk_core::{FarmId, UserId};
use agrisk_inventory::{LotRef, MovementType, StockMovement};

use super::{FarmRef, MovementLedger, RecipientDirectory, ReferenceData};
use crate::error::CollaboratorError;

#[derive(Debug, Clone)]
pub struct PostgresReferenceData {
    pool: Arc<PgPool>,
}

impl PostgresReferenceData {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait]
impl MovementLedger for PostgresReferenceData {
    #[instrument(skip(self), err)]
    async fn movements(&self, farm_id: Option<FarmId>) -> Result<Vec<StockMovement>, CollaboratorError> {
        let rows = sqlx::query(
            r#"
            SELECT
                m.lot_id,
                m.warehouse_id,
                m.location_id,
                m.movement_type,
                m.quantity,
                m.occurred_at
            FROM stock_movements m
            JOIN lots l ON l.id = m.lot_id
            WHERE ($1::uuid IS NULL OR l.farm_id = $1)
            ORDER BY m.occurred_at ASC, m.id ASC
            "#,
        )
        .bind(farm_id.map(Uuid::from))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("movements", e))?;

        rows.iter().map(movement_from_row).collect()
    }
}

#[async_trait]
impl ReferenceData for PostgresReferenceData {
    #[instrument(skip(self), err)]
    async fn farms(&self) -> Result<Vec<FarmRef>, CollaboratorError> {
        let rows = sqlx::query("SELECT id, name FROM farms ORDER BY name ASC, id ASC")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("farms", e))?;

        rows.iter()
            .map(|row| {
                Ok(FarmRef {
                    farm_id: FarmId::from_uuid(get(row, "id")?),
                    name: get(row, "name")?,
                })
            })
            .collect()
    }

    #[instrument(skip(self), err)]
    async fn lots(&self, farm_id: Option<FarmId>) -> Result<Vec<LotRef>, CollaboratorError> {
        let rows = sqlx::query(
            r#"
            SELECT
                l.id,
                l.farm_id,
                f.name AS farm_name,
                l.item_id,
                i.name AS item_name,
                l.lot_code,
                l.expiry_date,
                l.unit
            FROM lots l
            JOIN farms f ON f.id = l.farm_id
            JOIN items i ON i.id = l.item_id
            WHERE ($1::uuid IS NULL OR l.farm_id = $1)
            "#,
        )
        .bind(farm_id.map(Uuid::from))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("lots", e))?;

        rows.iter()
            .map(|row| {
                Ok(LotRef {
                    lot_id: get::<Uuid>(row, "id")?.into(),
                    farm_id: get::<Uuid>(row, "farm_id")?.into(),
                    farm_name: get(row, "farm_name")?,
                    item_id: get::<Uuid>(row, "item_id")?.into(),
                    item_name: get(row, "item_name")?,
                    lot_code: get(row, "lot_code")?,
                    expiry_date: get::<Option<NaiveDate>>(row, "expiry_date")?,
                    unit: get(row, "unit")?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl RecipientDirectory for PostgresReferenceData {
    #[instrument(skip(self), err)]
    async fn farm_users(&self, farm_id: FarmId) -> Result<Vec<UserId>, CollaboratorError> {
        let rows = sqlx::query(
            r#"
            SELECT fu.user_id
            FROM farm_users fu
            JOIN users u ON u.id = fu.user_id
            WHERE fu.farm_id = $1
            ORDER BY fu.user_id ASC
            "#,
        )
        .bind(farm_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("farm_users", e))?;

        rows.iter()
            .map(|row| Ok(UserId::from_uuid(get(row, "user_id")?)))
            .collect()
    }

    #[instrument(skip(self, ids), fields(requested = ids.len()), err)]
    async fn existing_users(&self, ids: &[UserId]) -> Result<Vec<UserId>, CollaboratorError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let wanted: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
        let rows = sqlx::query("SELECT id FROM users WHERE id = ANY($1)")
            .bind(&wanted)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("existing_users", e))?;

        let mut found = Vec::with_capacity(rows.len());
        for row in &rows {
            found.push(UserId::from_uuid(get(row, "id")?));
        }
        // Keep the caller's order.
        Ok(ids.iter().filter(|id| found.contains(id)).copied().collect())
    }
}

fn movement_from_row(row: &PgRow) -> Result<StockMovement, CollaboratorError> {
    let raw_type: String = get(row, "movement_type")?;
    let movement_type: MovementType = raw_type
        .parse()
        .map_err(|e| CollaboratorError::Invalid(format!("stock_movements.movement_type: {e}")))?;
    Ok(StockMovement {
        lot_id: get::<Uuid>(row, "lot_id")?.into(),
        warehouse_id: get::<Uuid>(row, "warehouse_id")?.into(),
        location_id: get::<Option<Uuid>>(row, "location_id")?.map(Into::into),
        movement_type,
        quantity: get::<Decimal>(row, "quantity")?,
        occurred_at: get::<DateTime<Utc>>(row, "occurred_at")?,
    })
}

fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<T, CollaboratorError>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(column)
        .map_err(|e| CollaboratorError::Invalid(format!("failed to read column {column}: {e}")))
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> CollaboratorError {
    match err {
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::ColumnNotFound(_) => {
            CollaboratorError::Invalid(format!("decode error in {operation}: {err}"))
        }
        other => CollaboratorError::Unavailable(format!("sqlx error in {operation}: {other}")),
    }
}
