use tracing::instrument;

use agrisk_core::FarmId;
use agrisk_inventory::{RiskFilter, RiskLot, RiskParams, RiskSummary, risk_lots, summarize};

use super::{AlertEngine, Page, PageRequest};
use crate::error::EngineResult;

impl AlertEngine {
    /// Classification parameters for "today", falling back to the configured window.
    pub fn risk_params(&self, window_days: Option<i64>) -> EngineResult<RiskParams> {
        let window = window_days.unwrap_or(self.config.default_window_days);
        Ok(RiskParams::new(self.today(), window)?
            .with_low_stock_threshold(self.config.low_stock_threshold))
    }

    /// Expired/expiring summary across all farms, worst farms first.
    #[instrument(skip(self), err)]
    pub async fn risk_summary(
        &self,
        window_days: Option<i64>,
        include_expiring: Option<bool>,
        top_n: Option<usize>,
    ) -> EngineResult<RiskSummary> {
        let params = self
            .risk_params(window_days)?
            .with_include_expiring(include_expiring.unwrap_or(true));
        let lots = self.list_on_hand_lots(None).await?;
        Ok(summarize(&lots, &params, top_n.unwrap_or(self.config.top_n)))
    }

    /// Detailed risk lots matching `filter`, most urgent first, one page at a time.
    #[instrument(skip(self), err)]
    pub async fn list_risk_lots(
        &self,
        farm_id: Option<FarmId>,
        filter: RiskFilter,
        window_days: Option<i64>,
        page: PageRequest,
    ) -> EngineResult<Page<RiskLot>> {
        let params = self.risk_params(window_days)?;
        let lots = self.list_on_hand_lots(farm_id).await?;
        Ok(Page::from_vec(risk_lots(&lots, &params, filter), page))
    }
}
