use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{PoisonError, RwLock, RwLockWriteGuard};

use async_trait::async_trait;

use agrisk_core::{FarmId, LotId, UserId};
use agrisk_inventory::{LotRef, StockMovement};

use super::{FarmRef, MovementLedger, RecipientDirectory, ReferenceData};
use crate::error::CollaboratorError;

#[derive(Debug, Default)]
struct Data {
    farms: BTreeMap<FarmId, String>,
    lots: BTreeMap<LotId, LotRef>,
    movements: Vec<StockMovement>,
    users: BTreeSet<UserId>,
    farm_users: BTreeMap<FarmId, Vec<UserId>>,
    unavailable: HashSet<FarmId>,
}

/// In-memory ledger, reference data and user directory for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryReferenceData {
    inner: RwLock<Data>,
}

impl InMemoryReferenceData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_farm(&self, farm_id: FarmId, name: impl Into<String>) {
        self.write().farms.insert(farm_id, name.into());
    }

    pub fn add_lot(&self, lot: LotRef) {
        self.write().lots.insert(lot.lot_id, lot);
    }

    pub fn record_movement(&self, movement: StockMovement) {
        self.write().movements.push(movement);
    }

    pub fn add_user(&self, user_id: UserId) {
        self.write().users.insert(user_id);
    }

    /// Register `user_id` (if needed) and associate it with `farm_id`.
    pub fn add_farm_user(&self, farm_id: FarmId, user_id: UserId) {
        let mut data = self.write();
        data.users.insert(user_id);
        let members = data.farm_users.entry(farm_id).or_default();
        if !members.contains(&user_id) {
            members.push(user_id);
        }
    }

    /// Make every per-farm read for `farm_id` fail, simulating an unreachable shard.
    pub fn set_farm_unavailable(&self, farm_id: FarmId, unavailable: bool) {
        let mut data = self.write();
        if unavailable {
            data.unavailable.insert(farm_id);
        } else {
            data.unavailable.remove(&farm_id);
        }
    }

    /// Seeding never loses a write, even after a panicking writer poisoned the lock.
    fn write(&self) -> RwLockWriteGuard<'_, Data> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Data>, CollaboratorError> {
        self.inner
            .read()
            .map_err(|_| CollaboratorError::Unavailable("reference data lock poisoned".to_string()))
    }
}

fn check_available(data: &Data, farm_id: Option<FarmId>) -> Result<(), CollaboratorError> {
    match farm_id {
        Some(id) if data.unavailable.contains(&id) => Err(CollaboratorError::Unavailable(format!(
            "reference data for farm {id} is unavailable"
        ))),
        _ => Ok(()),
    }
}

#[async_trait]
impl MovementLedger for InMemoryReferenceData {
    async fn movements(&self, farm_id: Option<FarmId>) -> Result<Vec<StockMovement>, CollaboratorError> {
        let data = self.read()?;
        check_available(&data, farm_id)?;
        let Some(farm_id) = farm_id else {
            return Ok(data.movements.clone());
        };
        Ok(data
            .movements
            .iter()
            .filter(|m| data.lots.get(&m.lot_id).is_some_and(|l| l.farm_id == farm_id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ReferenceData for InMemoryReferenceData {
    async fn farms(&self) -> Result<Vec<FarmRef>, CollaboratorError> {
        let data = self.read()?;
        Ok(data
            .farms
            .iter()
            .map(|(farm_id, name)| FarmRef {
                farm_id: *farm_id,
                name: name.clone(),
            })
            .collect())
    }

    async fn lots(&self, farm_id: Option<FarmId>) -> Result<Vec<LotRef>, CollaboratorError> {
        let data = self.read()?;
        check_available(&data, farm_id)?;
        Ok(data
            .lots
            .values()
            .filter(|l| farm_id.is_none_or(|f| l.farm_id == f))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl RecipientDirectory for InMemoryReferenceData {
    async fn farm_users(&self, farm_id: FarmId) -> Result<Vec<UserId>, CollaboratorError> {
        let data = self.read()?;
        check_available(&data, Some(farm_id))?;
        Ok(data.farm_users.get(&farm_id).cloned().unwrap_or_default())
    }

    async fn existing_users(&self, ids: &[UserId]) -> Result<Vec<UserId>, CollaboratorError> {
        let data = self.read()?;
        Ok(ids.iter().filter(|id| data.users.contains(id)).copied().collect())
    }
}
