use tracing::instrument;

use agrisk_core::FarmId;
use agrisk_inventory::{
    LocationOnHand, OnHandLot, matches_query, project_on_hand, project_on_hand_by_location,
};

use super::AlertEngine;
use crate::error::EngineResult;

impl AlertEngine {
    /// Lots with positive on-hand, optionally for one farm.
    #[instrument(skip(self), err)]
    pub async fn list_on_hand_lots(&self, farm_id: Option<FarmId>) -> EngineResult<Vec<OnHandLot>> {
        let movements = self.ledger.movements(farm_id).await?;
        let lots = self.reference.lots(farm_id).await?;
        Ok(project_on_hand(&movements, &lots)?)
    }

    /// On-hand lots narrowed by a case-insensitive item-name / lot-code query.
    #[instrument(skip(self), err)]
    pub async fn list_on_hand_lots_with_detail(
        &self,
        farm_id: Option<FarmId>,
        query: Option<&str>,
    ) -> EngineResult<Vec<OnHandLot>> {
        let lots = self.list_on_hand_lots(farm_id).await?;
        Ok(match query {
            Some(q) => lots.into_iter().filter(|l| matches_query(l, q)).collect(),
            None => lots,
        })
    }

    /// On-hand at `(lot, warehouse, location)` grain.
    #[instrument(skip(self), err)]
    pub async fn list_on_hand_by_location(
        &self,
        farm_id: Option<FarmId>,
    ) -> EngineResult<Vec<LocationOnHand>> {
        let movements = self.ledger.movements(farm_id).await?;
        let lots = self.reference.lots(farm_id).await?;
        Ok(project_on_hand_by_location(&movements, &lots)?)
    }
}
