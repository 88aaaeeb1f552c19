//! On-hand projection: derive current quantity per lot from the signed ledger.
//!
//! Projections here are pure functions over a snapshot of movements. They are
//! deterministic (stable output order) and never mutate their inputs, so callers
//! can run them concurrently with ledger writes against whatever snapshot they read.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use agrisk_core::{DomainError, FarmId, ItemId, LocationId, LotId, WarehouseId};

use crate::movement::{LotRef, StockMovement};

/// Derived, ephemeral on-hand view of one lot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnHandLot {
    pub farm_id: FarmId,
    pub farm_name: String,
    pub lot_id: LotId,
    pub item_id: ItemId,
    pub item_name: String,
    pub lot_code: String,
    pub expiry_date: Option<NaiveDate>,
    pub unit: String,
    pub on_hand: Decimal,
}

impl OnHandLot {
    fn from_ref(lot: &LotRef, on_hand: Decimal) -> Self {
        Self {
            farm_id: lot.farm_id,
            farm_name: lot.farm_name.clone(),
            lot_id: lot.lot_id,
            item_id: lot.item_id,
            item_name: lot.item_name.clone(),
            lot_code: lot.lot_code.clone(),
            expiry_date: lot.expiry_date,
            unit: lot.unit.clone(),
            on_hand,
        }
    }
}

/// On-hand of one lot at one storage position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationOnHand {
    #[serde(flatten)]
    pub lot: OnHandLot,
    pub warehouse_id: WarehouseId,
    pub location_id: Option<LocationId>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProjectionError {
    /// A lot with stock on hand has no reference data.
    #[error("lot {0} has stock on hand but no reference data")]
    UnknownLot(LotId),

    #[error(transparent)]
    InvalidMovement(#[from] DomainError),
}

/// Sum signed movements per lot and keep lots with a positive balance.
///
/// Lots that net to zero (or below) are dropped: a fully consumed lot is not an
/// error, it is simply not at risk. Only lots with stock on hand need reference data.
pub fn project_on_hand(
    movements: &[StockMovement],
    lots: &[LotRef],
) -> Result<Vec<OnHandLot>, ProjectionError> {
    let mut sums: BTreeMap<LotId, Decimal> = BTreeMap::new();
    for m in movements {
        m.validate()?;
        *sums.entry(m.lot_id).or_insert(Decimal::ZERO) += m.signed_quantity();
    }

    let refs = index_refs(lots);
    let mut out = Vec::new();
    for (lot_id, on_hand) in sums {
        if on_hand <= Decimal::ZERO {
            continue;
        }
        let lot = refs.get(&lot_id).ok_or(ProjectionError::UnknownLot(lot_id))?;
        out.push(OnHandLot::from_ref(lot, on_hand));
    }

    sort_lots(&mut out);
    Ok(out)
}

/// Finer-grained projection grouped by `(lot, warehouse, location)`.
pub fn project_on_hand_by_location(
    movements: &[StockMovement],
    lots: &[LotRef],
) -> Result<Vec<LocationOnHand>, ProjectionError> {
    let mut sums: BTreeMap<(LotId, WarehouseId, Option<LocationId>), Decimal> = BTreeMap::new();
    for m in movements {
        m.validate()?;
        *sums
            .entry((m.lot_id, m.warehouse_id, m.location_id))
            .or_insert(Decimal::ZERO) += m.signed_quantity();
    }

    let refs = index_refs(lots);
    let mut out = Vec::new();
    for ((lot_id, warehouse_id, location_id), on_hand) in sums {
        if on_hand <= Decimal::ZERO {
            continue;
        }
        let lot = refs.get(&lot_id).ok_or(ProjectionError::UnknownLot(lot_id))?;
        out.push(LocationOnHand {
            lot: OnHandLot::from_ref(lot, on_hand),
            warehouse_id,
            location_id,
        });
    }

    out.sort_by(|a, b| {
        lot_order(&a.lot, &b.lot)
            .then_with(|| a.warehouse_id.cmp(&b.warehouse_id))
            .then_with(|| a.location_id.cmp(&b.location_id))
    });
    Ok(out)
}

/// Case-insensitive substring match on item name or lot code.
///
/// An empty or whitespace-only query matches everything.
pub fn matches_query(lot: &OnHandLot, query: &str) -> bool {
    let q = query.trim().to_lowercase();
    if q.is_empty() {
        return true;
    }
    lot.item_name.to_lowercase().contains(&q) || lot.lot_code.to_lowercase().contains(&q)
}

fn index_refs(lots: &[LotRef]) -> HashMap<LotId, &LotRef> {
    lots.iter().map(|l| (l.lot_id, l)).collect()
}

fn lot_order(a: &OnHandLot, b: &OnHandLot) -> core::cmp::Ordering {
    a.farm_name
        .cmp(&b.farm_name)
        .then_with(|| a.farm_id.cmp(&b.farm_id))
        .then_with(|| a.item_name.cmp(&b.item_name))
        .then_with(|| a.lot_code.cmp(&b.lot_code))
        .then_with(|| a.lot_id.cmp(&b.lot_id))
}

fn sort_lots(lots: &mut [OnHandLot]) {
    lots.sort_by(lot_order);
}
