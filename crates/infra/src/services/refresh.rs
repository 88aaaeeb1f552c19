//! Alert refresh: scan every farm and create at most one alert per
//! `(farm, type, calendar day)`.
//!
//! Farms are scanned independently. A farm whose reference data cannot be read
//! is reported in `failures` and the scan moves on; store failures abort the
//! whole refresh since they affect every farm alike.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use agrisk_alerts::{
    Alert, AlertType, InventoryFinding, LinkContext, NewAlert, render_inventory_alert,
};
use agrisk_core::{AlertId, FarmId};
use agrisk_inventory::{RiskFilter, RiskParams, risk_lots};

use super::AlertEngine;
use crate::clock::{day_bounds, local_date};
use crate::collaborators::FarmRef;
use crate::error::{EngineError, EngineResult};
use crate::store::InsertOutcome;

const SCANNED_TYPES: [(AlertType, RiskFilter); 2] = [
    (AlertType::InventoryExpired, RiskFilter::Expired),
    (AlertType::InventoryExpiring, RiskFilter::Expiring),
];

/// An alert touched by a refresh, with whether this scan created it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshedAlert {
    #[serde(flatten)]
    pub alert: Alert,
    pub created: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmFailure {
    pub farm_id: FarmId,
    pub farm_name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshReport {
    pub alerts: Vec<RefreshedAlert>,
    pub failures: Vec<FarmFailure>,
}

impl RefreshReport {
    pub fn created_count(&self) -> usize {
        self.alerts.iter().filter(|a| a.created).count()
    }
}

impl AlertEngine {
    #[instrument(skip(self), err)]
    pub async fn refresh(&self, window_days: Option<i64>) -> EngineResult<RefreshReport> {
        let now = self.clock.now();
        let today = local_date(now, self.config.utc_offset);
        let window = window_days.unwrap_or(self.config.default_window_days);
        let params = RiskParams::new(today, window)?;

        let farms = self.reference.farms().await?;
        let mut report = RefreshReport::default();

        for farm in &farms {
            match self.scan_farm(farm, &params, now).await {
                Ok(mut touched) => report.alerts.append(&mut touched),
                Err(EngineError::Store(e)) => return Err(EngineError::Store(e)),
                Err(e) => {
                    warn!(farm_id = %farm.farm_id, error = %e, "farm skipped during refresh");
                    report.failures.push(FarmFailure {
                        farm_id: farm.farm_id,
                        farm_name: farm.name.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            farms = farms.len(),
            touched = report.alerts.len(),
            created = report.created_count(),
            failed = report.failures.len(),
            "alert refresh complete"
        );
        Ok(report)
    }

    #[instrument(skip(self, farm, params, now), fields(farm_id = %farm.farm_id), err)]
    async fn scan_farm(
        &self,
        farm: &FarmRef,
        params: &RiskParams,
        now: DateTime<Utc>,
    ) -> EngineResult<Vec<RefreshedAlert>> {
        let lots = self.list_on_hand_lots(Some(farm.farm_id)).await?;

        let mut touched = Vec::new();
        for (alert_type, filter) in SCANNED_TYPES {
            let findings = risk_lots(&lots, params, filter);
            if findings.is_empty() {
                continue;
            }
            let finding = InventoryFinding {
                farm_id: farm.farm_id,
                farm_name: farm.name.clone(),
                lot_count: u32::try_from(findings.len()).unwrap_or(u32::MAX),
                qty: findings.iter().map(|l| l.on_hand).sum::<Decimal>(),
                window_days: params.window_days(),
            };
            touched.push(self.reuse_or_create(alert_type, &finding, now).await?);
        }
        Ok(touched)
    }

    /// Today's alert for `(farm, type)` if one exists, otherwise a new one.
    async fn reuse_or_create(
        &self,
        alert_type: AlertType,
        finding: &InventoryFinding,
        now: DateTime<Utc>,
    ) -> EngineResult<RefreshedAlert> {
        let offset = self.config.utc_offset;
        let today = local_date(now, offset);
        let (day_start, day_end) = day_bounds(today, offset);

        if let Some(existing) = self
            .store
            .find_for_day(finding.farm_id, alert_type, day_start, day_end)
            .await?
        {
            debug!(alert_id = %existing.id(), alert_type = alert_type.as_str(), "reusing today's alert");
            return Ok(RefreshedAlert {
                alert: existing,
                created: false,
            });
        }

        let severity = self
            .config
            .severity
            .severity(alert_type, finding.lot_count, finding.qty)?;
        let links = LinkContext {
            base_url: self.config.action_base_url.clone(),
        };
        let content = render_inventory_alert(alert_type, finding, &links)?;
        let candidate = Alert::create(
            AlertId::new(),
            NewAlert {
                alert_type,
                severity,
                farm_id: finding.farm_id,
                season_id: None,
                plot_id: None,
                crop_id: None,
                content,
                created_at: now,
            },
        )?;

        // A concurrent refresh may win the bucket between the lookup and here.
        let refreshed = RefreshedAlert::from(self.store.insert_if_absent(candidate, today).await?);
        info!(
            alert_id = %refreshed.alert.id(),
            alert_type = alert_type.as_str(),
            severity = refreshed.alert.severity().as_str(),
            created = refreshed.created,
            "inventory alert recorded"
        );
        Ok(refreshed)
    }
}

impl From<InsertOutcome> for RefreshedAlert {
    fn from(outcome: InsertOutcome) -> Self {
        let created = outcome.created();
        RefreshedAlert {
            alert: outcome.into_alert(),
            created,
        }
    }
}
