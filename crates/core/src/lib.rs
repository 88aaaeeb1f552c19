//! `agrisk-core`: shared building blocks for the inventory risk engine.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::{
    AlertId, CropId, FarmId, ItemId, LocationId, LotId, NotificationId, PlotId, SeasonId, UserId,
    WarehouseId,
};
