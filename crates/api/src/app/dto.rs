use std::str::FromStr;

use serde::Deserialize;

use agrisk_core::{DomainError, DomainResult, UserId};
use agrisk_infra::store::AlertFilter;

// -------------------------
// Query DTOs
// -------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskSummaryQuery {
    pub window_days: Option<i64>,
    pub include_expiring: Option<bool>,
    pub top_n: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskLotsQuery {
    pub farm_id: Option<String>,
    pub status: Option<String>,
    pub window_days: Option<i64>,
    pub page: Option<u32>,
    pub size: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnHandQuery {
    pub farm_id: Option<String>,
    pub q: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertListQuery {
    pub farm_id: Option<String>,
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub alert_type: Option<String>,
    pub page: Option<u32>,
    pub size: Option<u32>,
}

impl AlertListQuery {
    pub fn to_filter(&self) -> DomainResult<AlertFilter> {
        Ok(AlertFilter {
            farm_id: parse_opt(self.farm_id.as_deref())?,
            status: parse_opt(self.status.as_deref())?,
            alert_type: parse_opt(self.alert_type.as_deref())?,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationsQuery {
    pub unread_only: Option<bool>,
    pub page: Option<u32>,
    pub size: Option<u32>,
}

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub window_days: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendAlertRequest {
    pub channel: String,
    pub recipient_mode: String,
    pub recipient_farmer_ids: Option<Vec<String>>,
}

impl SendAlertRequest {
    pub fn recipient_ids(&self) -> DomainResult<Option<Vec<UserId>>> {
        self.recipient_farmer_ids
            .as_ref()
            .map(|ids| ids.iter().map(|s| s.parse()).collect())
            .transpose()
    }
}

// -------------------------
// Parsing helpers
// -------------------------

/// Parse an optional query value; blank values count as absent.
pub fn parse_opt<T>(value: Option<&str>) -> DomainResult<Option<T>>
where
    T: FromStr<Err = DomainError>,
{
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => v.parse().map(Some),
    }
}
