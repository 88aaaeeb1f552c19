use core::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use agrisk_core::{DomainError, FarmId, ItemId, LocationId, LotId, WarehouseId};

/// Direction of a ledger movement.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementType {
    In,
    Out,
    Adjust,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::In => "IN",
            MovementType::Out => "OUT",
            MovementType::Adjust => "ADJUST",
        }
    }
}

impl FromStr for MovementType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "IN" => Ok(MovementType::In),
            "OUT" => Ok(MovementType::Out),
            "ADJUST" => Ok(MovementType::Adjust),
            other => Err(DomainError::validation(format!(
                "unknown movement type '{other}' (expected IN, OUT or ADJUST)"
            ))),
        }
    }
}

/// One row of the stock movement ledger (read-only input).
///
/// `quantity` is a magnitude for `IN`/`OUT`; the sign comes from the type.
/// `ADJUST` rows carry their own sign and are applied as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockMovement {
    pub lot_id: LotId,
    pub warehouse_id: WarehouseId,
    pub location_id: Option<LocationId>,
    #[serde(rename = "type")]
    pub movement_type: MovementType,
    pub quantity: Decimal,
    pub occurred_at: DateTime<Utc>,
}

impl StockMovement {
    /// Quantity contribution of this movement to the lot's on-hand balance.
    pub fn signed_quantity(&self) -> Decimal {
        match self.movement_type {
            MovementType::In => self.quantity,
            MovementType::Out => -self.quantity,
            MovementType::Adjust => self.quantity,
        }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.quantity.is_sign_negative()
            && !self.quantity.is_zero()
            && self.movement_type != MovementType::Adjust
        {
            return Err(DomainError::validation(format!(
                "{} movement for lot {} has negative quantity {}",
                self.movement_type.as_str(),
                self.lot_id,
                self.quantity
            )));
        }
        Ok(())
    }
}

/// Farm/lot reference data used for display and grouping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LotRef {
    pub lot_id: LotId,
    pub farm_id: FarmId,
    pub farm_name: String,
    pub item_id: ItemId,
    pub item_name: String,
    pub lot_code: String,
    pub expiry_date: Option<NaiveDate>,
    pub unit: String,
}
