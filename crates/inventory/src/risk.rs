//! Expiry/shortage risk classification over on-hand lots.
//!
//! Classification is evaluated per lot in precedence order (first match wins):
//! 1. expiry before today → `Expired`
//! 2. expiring scan enabled and `today <= expiry <= today + window` → `Expiring`
//! 3. no expiry date → `UnknownExpiry`
//! 4. on-hand below the low-stock threshold → `LowStock`
//!
//! Anything else is not risk-relevant.

use core::cmp::Ordering;
use core::str::FromStr;
use std::collections::HashMap;

use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use agrisk_core::{DomainError, DomainResult, FarmId, ItemId, LotId};

use crate::on_hand::OnHandLot;

/// Upper bound for the look-ahead window (ten years).
pub const MAX_WINDOW_DAYS: i64 = 3650;

/// Risk bucket of a single lot.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskStatus {
    Expired,
    Expiring,
    UnknownExpiry,
    LowStock,
}

impl RiskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskStatus::Expired => "EXPIRED",
            RiskStatus::Expiring => "EXPIRING",
            RiskStatus::UnknownExpiry => "UNKNOWN_EXPIRY",
            RiskStatus::LowStock => "LOW_STOCK",
        }
    }

    /// Expired or expiring: the statuses that count towards quantity at risk.
    pub fn is_expiry_risk(&self) -> bool {
        matches!(self, RiskStatus::Expired | RiskStatus::Expiring)
    }

    fn rank(&self) -> u8 {
        match self {
            RiskStatus::Expired => 0,
            RiskStatus::Expiring => 1,
            RiskStatus::UnknownExpiry => 2,
            RiskStatus::LowStock => 3,
        }
    }
}

/// Status filter for the detailed risk-lot listing.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskFilter {
    Expired,
    Expiring,
    /// Expired or expiring.
    Risk,
    UnknownExpiry,
    LowStock,
}

impl RiskFilter {
    pub fn matches(&self, status: RiskStatus) -> bool {
        match self {
            RiskFilter::Expired => status == RiskStatus::Expired,
            RiskFilter::Expiring => status == RiskStatus::Expiring,
            RiskFilter::Risk => status.is_expiry_risk(),
            RiskFilter::UnknownExpiry => status == RiskStatus::UnknownExpiry,
            RiskFilter::LowStock => status == RiskStatus::LowStock,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskFilter::Expired => "EXPIRED",
            RiskFilter::Expiring => "EXPIRING",
            RiskFilter::Risk => "RISK",
            RiskFilter::UnknownExpiry => "UNKNOWN_EXPIRY",
            RiskFilter::LowStock => "LOW_STOCK",
        }
    }
}

impl FromStr for RiskFilter {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "EXPIRED" => Ok(RiskFilter::Expired),
            "EXPIRING" => Ok(RiskFilter::Expiring),
            "RISK" => Ok(RiskFilter::Risk),
            "UNKNOWN_EXPIRY" => Ok(RiskFilter::UnknownExpiry),
            "LOW_STOCK" => Ok(RiskFilter::LowStock),
            other => Err(DomainError::validation(format!(
                "unknown status filter '{other}' (expected one of EXPIRED, EXPIRING, RISK, UNKNOWN_EXPIRY, LOW_STOCK)"
            ))),
        }
    }
}

/// Inputs of a classification run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskParams {
    today: NaiveDate,
    window_days: u32,
    include_expiring: bool,
    low_stock_threshold: Option<Decimal>,
}

impl RiskParams {
    /// Validated parameters; `window_days` must be in `1..=MAX_WINDOW_DAYS`.
    pub fn new(today: NaiveDate, window_days: i64) -> DomainResult<Self> {
        if window_days <= 0 {
            return Err(DomainError::validation(format!(
                "windowDays must be positive (got {window_days})"
            )));
        }
        if window_days > MAX_WINDOW_DAYS {
            return Err(DomainError::validation(format!(
                "windowDays must be at most {MAX_WINDOW_DAYS} (got {window_days})"
            )));
        }
        Ok(Self {
            today,
            window_days: window_days as u32,
            include_expiring: true,
            low_stock_threshold: None,
        })
    }

    pub fn with_include_expiring(mut self, include_expiring: bool) -> Self {
        self.include_expiring = include_expiring;
        self
    }

    pub fn with_low_stock_threshold(mut self, threshold: Option<Decimal>) -> Self {
        self.low_stock_threshold = threshold;
        self
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn window_days(&self) -> u32 {
        self.window_days
    }

    pub fn include_expiring(&self) -> bool {
        self.include_expiring
    }

    pub fn low_stock_threshold(&self) -> Option<Decimal> {
        self.low_stock_threshold
    }

    /// Last day (inclusive) of the expiring window.
    pub fn window_end(&self) -> NaiveDate {
        self.today
            .checked_add_days(Days::new(u64::from(self.window_days)))
            .unwrap_or(NaiveDate::MAX)
    }
}

/// Days from `today` until expiry (negative once expired), `None` when unknown.
pub fn days_to_expiry(expiry_date: Option<NaiveDate>, today: NaiveDate) -> Option<i64> {
    expiry_date.map(|d| (d - today).num_days())
}

/// Classify one lot. Returns `None` when the lot is not risk-relevant.
pub fn classify(lot: &OnHandLot, params: &RiskParams) -> Option<RiskStatus> {
    if lot.on_hand <= Decimal::ZERO {
        return None;
    }

    match lot.expiry_date {
        Some(expiry) if expiry < params.today => return Some(RiskStatus::Expired),
        Some(expiry) if params.include_expiring && expiry <= params.window_end() => {
            return Some(RiskStatus::Expiring);
        }
        None => return Some(RiskStatus::UnknownExpiry),
        Some(_) => {}
    }

    match params.low_stock_threshold {
        Some(threshold) if lot.on_hand < threshold => Some(RiskStatus::LowStock),
        _ => None,
    }
}

/// One classified lot, as shown in detailed listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskLot {
    pub lot_id: LotId,
    pub farm_id: FarmId,
    pub farm_name: String,
    pub item_id: ItemId,
    pub item_name: String,
    pub lot_code: String,
    pub expiry_date: Option<NaiveDate>,
    pub on_hand: Decimal,
    pub unit: String,
    pub days_to_expiry: Option<i64>,
    pub status: RiskStatus,
}

impl RiskLot {
    fn new(lot: &OnHandLot, status: RiskStatus, today: NaiveDate) -> Self {
        Self {
            lot_id: lot.lot_id,
            farm_id: lot.farm_id,
            farm_name: lot.farm_name.clone(),
            item_id: lot.item_id,
            item_name: lot.item_name.clone(),
            lot_code: lot.lot_code.clone(),
            expiry_date: lot.expiry_date,
            on_hand: lot.on_hand,
            unit: lot.unit.clone(),
            days_to_expiry: days_to_expiry(lot.expiry_date, today),
            status,
        }
    }
}

/// Most urgent first: status rank, then ascending days to expiry (unknown last).
fn urgency(a: &RiskLot, b: &RiskLot) -> Ordering {
    a.status
        .rank()
        .cmp(&b.status.rank())
        .then_with(|| match (a.days_to_expiry, b.days_to_expiry) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.on_hand.cmp(&b.on_hand).reverse())
        .then_with(|| a.item_name.cmp(&b.item_name))
        .then_with(|| a.lot_id.cmp(&b.lot_id))
}

/// Per-farm risk breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmRisk {
    pub farm_id: FarmId,
    pub farm_name: String,
    pub expired_lots: u32,
    pub expiring_lots: u32,
    pub unknown_expiry_lots: u32,
    pub qty_at_risk: Decimal,
    /// Riskiest expired/expiring lots of this farm, most urgent first.
    pub top_lots: Vec<RiskLot>,
}

impl FarmRisk {
    pub fn new(farm_id: FarmId, farm_name: impl Into<String>) -> Self {
        Self {
            farm_id,
            farm_name: farm_name.into(),
            expired_lots: 0,
            expiring_lots: 0,
            unknown_expiry_lots: 0,
            qty_at_risk: Decimal::ZERO,
            top_lots: Vec::new(),
        }
    }

    pub fn has_findings(&self) -> bool {
        self.expired_lots > 0 || self.expiring_lots > 0 || self.unknown_expiry_lots > 0
    }

    fn record(&mut self, lot: RiskLot) {
        match lot.status {
            RiskStatus::Expired => self.expired_lots += 1,
            RiskStatus::Expiring => self.expiring_lots += 1,
            RiskStatus::UnknownExpiry => self.unknown_expiry_lots += 1,
            RiskStatus::LowStock => {}
        }
        if lot.status.is_expiry_risk() {
            self.qty_at_risk += lot.on_hand;
            self.top_lots.push(lot);
        }
    }
}

/// Aggregated result of a classification run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskSummary {
    pub as_of: NaiveDate,
    pub window_days: u32,
    pub include_expiring: bool,
    pub expired_lots: u32,
    pub expiring_lots: u32,
    pub unknown_expiry_lots: u32,
    /// Sum of on-hand over expired and expiring lots only.
    pub qty_at_risk: Decimal,
    /// Farms with at least one finding, worst first.
    pub farms: Vec<FarmRisk>,
}

/// Classify all lots and aggregate them globally and per farm.
///
/// Each farm keeps at most `top_n` of its riskiest lots.
pub fn summarize(lots: &[OnHandLot], params: &RiskParams, top_n: usize) -> RiskSummary {
    let mut farms: HashMap<FarmId, FarmRisk> = HashMap::new();

    for lot in lots {
        let Some(status) = classify(lot, params) else {
            continue;
        };
        farms
            .entry(lot.farm_id)
            .or_insert_with(|| FarmRisk::new(lot.farm_id, lot.farm_name.clone()))
            .record(RiskLot::new(lot, status, params.today));
    }

    let mut summary = RiskSummary {
        as_of: params.today,
        window_days: params.window_days,
        include_expiring: params.include_expiring,
        expired_lots: 0,
        expiring_lots: 0,
        unknown_expiry_lots: 0,
        qty_at_risk: Decimal::ZERO,
        farms: Vec::new(),
    };

    let mut with_findings = Vec::with_capacity(farms.len());
    for (_, mut farm) in farms {
        summary.expired_lots += farm.expired_lots;
        summary.expiring_lots += farm.expiring_lots;
        summary.unknown_expiry_lots += farm.unknown_expiry_lots;
        summary.qty_at_risk += farm.qty_at_risk;

        if !farm.has_findings() {
            continue;
        }
        farm.top_lots.sort_by(urgency);
        farm.top_lots.truncate(top_n);
        with_findings.push(farm);
    }

    summary.farms = rank_farms(with_findings);
    summary
}

/// Order farms worst first: expired desc, then expiring desc, then qty at risk desc.
///
/// Ties fall back to farm name and id so the order is deterministic.
pub fn rank_farms(mut farms: Vec<FarmRisk>) -> Vec<FarmRisk> {
    farms.sort_by(|a, b| {
        b.expired_lots
            .cmp(&a.expired_lots)
            .then_with(|| b.expiring_lots.cmp(&a.expiring_lots))
            .then_with(|| b.qty_at_risk.cmp(&a.qty_at_risk))
            .then_with(|| a.farm_name.cmp(&b.farm_name))
            .then_with(|| a.farm_id.cmp(&b.farm_id))
    });
    farms
}

/// Detailed listing: every classified lot matching `filter`, most urgent first.
pub fn risk_lots(lots: &[OnHandLot], params: &RiskParams, filter: RiskFilter) -> Vec<RiskLot> {
    let mut out: Vec<RiskLot> = lots
        .iter()
        .filter_map(|lot| {
            let status = classify(lot, params)?;
            filter
                .matches(status)
                .then(|| RiskLot::new(lot, status, params.today))
        })
        .collect();
    out.sort_by(urgency);
    out
}
