//! Data-driven severity thresholds.
//!
//! Each alert type maps to a scale: a floor severity plus threshold steps keyed
//! by affected lot count and/or quantity. The highest matching step wins.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use agrisk_core::{DomainError, DomainResult};

use crate::alert::{AlertType, Severity};

/// Raises severity when either threshold is reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeverityStep {
    pub min_lots: Option<u32>,
    pub min_qty: Option<Decimal>,
    pub severity: Severity,
}

impl SeverityStep {
    pub fn matches(&self, lots: u32, qty: Decimal) -> bool {
        self.min_lots.is_some_and(|min| lots >= min) || self.min_qty.is_some_and(|min| qty >= min)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeverityScale {
    pub floor: Severity,
    pub steps: Vec<SeverityStep>,
}

impl SeverityScale {
    pub fn severity_for(&self, lots: u32, qty: Decimal) -> Severity {
        self.steps
            .iter()
            .filter(|s| s.matches(lots, qty))
            .map(|s| s.severity)
            .fold(self.floor, Severity::max)
    }
}

/// Severity rules for the inventory alert types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeverityPolicy {
    pub expired: SeverityScale,
    pub expiring: SeverityScale,
}

impl Default for SeverityPolicy {
    fn default() -> Self {
        Self {
            expired: SeverityScale {
                floor: Severity::High,
                steps: vec![SeverityStep {
                    min_lots: Some(5),
                    min_qty: Some(Decimal::from(100)),
                    severity: Severity::Critical,
                }],
            },
            expiring: SeverityScale {
                floor: Severity::Low,
                steps: vec![
                    SeverityStep {
                        min_lots: Some(3),
                        min_qty: Some(Decimal::from(50)),
                        severity: Severity::Medium,
                    },
                    SeverityStep {
                        min_lots: Some(10),
                        min_qty: None,
                        severity: Severity::High,
                    },
                ],
            },
        }
    }
}

impl SeverityPolicy {
    /// Any expired lot is at least HIGH; a weaker expired floor is rejected.
    pub fn validate(&self) -> DomainResult<()> {
        if self.expired.floor < Severity::High {
            return Err(DomainError::validation(format!(
                "expired severity floor must be HIGH or CRITICAL, got {}",
                self.expired.floor.as_str()
            )));
        }
        for step in self.expired.steps.iter().chain(self.expiring.steps.iter()) {
            if step.min_lots.is_none() && step.min_qty.is_none() {
                return Err(DomainError::validation(
                    "severity step needs a lot or quantity threshold",
                ));
            }
        }
        Ok(())
    }

    pub fn scale_for(&self, alert_type: AlertType) -> Option<&SeverityScale> {
        match alert_type {
            AlertType::InventoryExpired => Some(&self.expired),
            AlertType::InventoryExpiring => Some(&self.expiring),
            _ => None,
        }
    }

    pub fn severity(&self, alert_type: AlertType, lots: u32, qty: Decimal) -> DomainResult<Severity> {
        self.scale_for(alert_type)
            .map(|scale| scale.severity_for(lots, qty))
            .ok_or_else(|| {
                DomainError::validation(format!(
                    "no severity scale for alert type {}",
                    alert_type.as_str()
                ))
            })
    }
}
