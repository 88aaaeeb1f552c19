//! Inventory risk domain module.
//!
//! This crate contains the stock-risk rules, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage):
//! - `movement`: the signed movement ledger and lot reference data
//! - `on_hand`: on-hand projection from the ledger
//! - `risk`: expiry/shortage classification, summaries and farm ranking

pub mod movement;
pub mod on_hand;
pub mod risk;

pub use movement::{LotRef, MovementType, StockMovement};
pub use on_hand::{
    LocationOnHand, OnHandLot, ProjectionError, matches_query, project_on_hand,
    project_on_hand_by_location,
};
pub use risk::{
    FarmRisk, RiskFilter, RiskLot, RiskParams, RiskStatus, RiskSummary, classify, days_to_expiry,
    rank_farms, risk_lots, summarize,
};
