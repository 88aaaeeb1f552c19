//! Read-only collaborators consumed by the engine: the movement ledger, farm/lot
//! reference data and the user directory used to resolve recipients.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use agrisk_core::{FarmId, UserId};
use agrisk_inventory::{LotRef, StockMovement};

use crate::error::CollaboratorError;

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryReferenceData;
pub use postgres::PostgresReferenceData;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmRef {
    pub farm_id: FarmId,
    pub name: String,
}

#[async_trait]
pub trait MovementLedger: Send + Sync {
    /// Snapshot of ledger rows, optionally limited to lots of one farm.
    async fn movements(&self, farm_id: Option<FarmId>) -> Result<Vec<StockMovement>, CollaboratorError>;
}

#[async_trait]
pub trait ReferenceData: Send + Sync {
    async fn farms(&self) -> Result<Vec<FarmRef>, CollaboratorError>;

    async fn lots(&self, farm_id: Option<FarmId>) -> Result<Vec<LotRef>, CollaboratorError>;
}

#[async_trait]
pub trait RecipientDirectory: Send + Sync {
    /// Users associated with a farm (owner and members).
    async fn farm_users(&self, farm_id: FarmId) -> Result<Vec<UserId>, CollaboratorError>;

    /// The subset of `ids` that refer to existing users.
    async fn existing_users(&self, ids: &[UserId]) -> Result<Vec<UserId>, CollaboratorError>;
}
