//! Alert type → human-readable content.
//!
//! The table is data: adding a type means adding a row, not touching the
//! dedup or lifecycle code.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use agrisk_core::{DomainError, DomainResult, FarmId};

use crate::alert::AlertType;

/// Rendered title/message/action for one alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertContent {
    pub title: String,
    pub message: String,
    pub action_type: String,
    pub action_url: String,
}

/// Aggregated finding for one farm and one inventory alert type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryFinding {
    pub farm_id: FarmId,
    pub farm_name: String,
    pub lot_count: u32,
    pub qty: Decimal,
    pub window_days: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkContext {
    /// Inventory lot view the action deep-links to.
    pub base_url: String,
}

struct Template {
    alert_type: AlertType,
    title: &'static str,
    message: &'static str,
    action_type: &'static str,
    status_filter: &'static str,
}

const TEMPLATES: &[Template] = &[
    Template {
        alert_type: AlertType::InventoryExpired,
        title: "{farm}: {count} expired lot(s)",
        message: "{count} lot(s) at {farm} are past their expiry date with {qty} unit(s) still on hand.",
        action_type: "VIEW_INVENTORY_LOTS",
        status_filter: "EXPIRED",
    },
    Template {
        alert_type: AlertType::InventoryExpiring,
        title: "{farm}: {count} lot(s) expiring within {window} days",
        message: "{count} lot(s) at {farm} expire within the next {window} days with {qty} unit(s) on hand.",
        action_type: "VIEW_INVENTORY_LOTS",
        status_filter: "EXPIRING",
    },
];

pub fn render_inventory_alert(
    alert_type: AlertType,
    finding: &InventoryFinding,
    links: &LinkContext,
) -> DomainResult<AlertContent> {
    let template = TEMPLATES
        .iter()
        .find(|t| t.alert_type == alert_type)
        .ok_or_else(|| {
            DomainError::validation(format!("no template for alert type {}", alert_type.as_str()))
        })?;

    let fill = |text: &str| {
        text.replace("{farm}", &finding.farm_name)
            .replace("{count}", &finding.lot_count.to_string())
            .replace("{qty}", &finding.qty.normalize().to_string())
            .replace("{window}", &finding.window_days.to_string())
    };

    let separator = if links.base_url.contains('?') { '&' } else { '?' };
    let action_url = format!(
        "{}{}farmId={}&status={}&windowDays={}",
        links.base_url, separator, finding.farm_id, template.status_filter, finding.window_days
    );

    Ok(AlertContent {
        title: fill(template.title),
        message: fill(template.message),
        action_type: template.action_type.to_string(),
        action_url,
    })
}
