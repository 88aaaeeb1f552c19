//! Alert entity and its lifecycle.
//!
//! ```text
//!            mark_sent
//!   NEW ─────────────────► SENT
//!    │ \                   │  \
//!    │  acknowledge        │   acknowledge
//!    │    └──────► ACKNOWLEDGED ◄┘
//!    │                     │
//!    └── resolve/dismiss ──┴──► RESOLVED | DISMISSED (terminal)
//! ```
//!
//! Every transition validates the current state first; nothing re-enters `NEW`
//! and an alert is sent at most once.

use core::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use agrisk_core::{
    AlertId, CropId, DomainError, DomainResult, FarmId, PlotId, SeasonId, UserId,
};

use crate::template::AlertContent;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertType {
    InventoryExpired,
    InventoryExpiring,
    TaskOverdue,
    BudgetOverspend,
    IncidentOpen,
}

impl AlertType {
    pub const ALL: [AlertType; 5] = [
        AlertType::InventoryExpired,
        AlertType::InventoryExpiring,
        AlertType::TaskOverdue,
        AlertType::BudgetOverspend,
        AlertType::IncidentOpen,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::InventoryExpired => "INVENTORY_EXPIRED",
            AlertType::InventoryExpiring => "INVENTORY_EXPIRING",
            AlertType::TaskOverdue => "TASK_OVERDUE",
            AlertType::BudgetOverspend => "BUDGET_OVERSPEND",
            AlertType::IncidentOpen => "INCIDENT_OPEN",
        }
    }

    /// Types produced by the inventory risk scan.
    pub fn is_inventory(&self) -> bool {
        matches!(self, AlertType::InventoryExpired | AlertType::InventoryExpiring)
    }
}

impl FromStr for AlertType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim().to_ascii_uppercase();
        AlertType::ALL
            .into_iter()
            .find(|t| t.as_str() == token)
            .ok_or_else(|| DomainError::validation(format!("unknown alert type '{token}'")))
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl FromStr for Severity {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOW" => Ok(Severity::Low),
            "MEDIUM" => Ok(Severity::Medium),
            "HIGH" => Ok(Severity::High),
            "CRITICAL" => Ok(Severity::Critical),
            other => Err(DomainError::validation(format!("unknown severity '{other}'"))),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertStatus {
    New,
    Sent,
    Acknowledged,
    Resolved,
    Dismissed,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::New => "NEW",
            AlertStatus::Sent => "SENT",
            AlertStatus::Acknowledged => "ACKNOWLEDGED",
            AlertStatus::Resolved => "RESOLVED",
            AlertStatus::Dismissed => "DISMISSED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AlertStatus::Resolved | AlertStatus::Dismissed)
    }
}

impl FromStr for AlertStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NEW" => Ok(AlertStatus::New),
            "SENT" => Ok(AlertStatus::Sent),
            "ACKNOWLEDGED" => Ok(AlertStatus::Acknowledged),
            "RESOLVED" => Ok(AlertStatus::Resolved),
            "DISMISSED" => Ok(AlertStatus::Dismissed),
            other => Err(DomainError::validation(format!("unknown alert status '{other}'"))),
        }
    }
}

/// Input for creating an alert in state `NEW`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAlert {
    pub alert_type: AlertType,
    pub severity: Severity,
    pub farm_id: FarmId,
    pub season_id: Option<SeasonId>,
    pub plot_id: Option<PlotId>,
    pub crop_id: Option<CropId>,
    pub content: AlertContent,
    pub created_at: DateTime<Utc>,
}

/// Plain record of every alert attribute, used to rehydrate persisted rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertRecord {
    pub id: AlertId,
    pub alert_type: AlertType,
    pub severity: Severity,
    pub status: AlertStatus,
    pub farm_id: FarmId,
    pub season_id: Option<SeasonId>,
    pub plot_id: Option<PlotId>,
    pub crop_id: Option<CropId>,
    pub title: String,
    pub message: String,
    pub suggested_action_type: String,
    pub suggested_action_url: String,
    pub recipient_farmer_ids: Vec<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

/// The central stateful entity of the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    id: AlertId,
    #[serde(rename = "type")]
    alert_type: AlertType,
    severity: Severity,
    status: AlertStatus,
    farm_id: FarmId,
    season_id: Option<SeasonId>,
    plot_id: Option<PlotId>,
    crop_id: Option<CropId>,
    title: String,
    message: String,
    suggested_action_type: String,
    suggested_action_url: String,
    recipient_farmer_ids: Vec<UserId>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    sent_at: Option<DateTime<Utc>>,
}

impl Alert {
    /// Create a fresh alert in state `NEW`.
    pub fn create(id: AlertId, new: NewAlert) -> DomainResult<Self> {
        if new.content.title.trim().is_empty() {
            return Err(DomainError::validation("alert title cannot be empty"));
        }
        Ok(Self {
            id,
            alert_type: new.alert_type,
            severity: new.severity,
            status: AlertStatus::New,
            farm_id: new.farm_id,
            season_id: new.season_id,
            plot_id: new.plot_id,
            crop_id: new.crop_id,
            title: new.content.title,
            message: new.content.message,
            suggested_action_type: new.content.action_type,
            suggested_action_url: new.content.action_url,
            recipient_farmer_ids: Vec::new(),
            created_at: new.created_at,
            updated_at: new.created_at,
            sent_at: None,
        })
    }

    /// Rebuild an alert from a persisted record, checking status/timestamp consistency.
    pub fn rehydrate(record: AlertRecord) -> DomainResult<Self> {
        match (record.status, record.sent_at) {
            (AlertStatus::New, Some(_)) => {
                return Err(DomainError::invariant(format!(
                    "alert {} is NEW but has sent_at",
                    record.id
                )));
            }
            (AlertStatus::Sent, None) => {
                return Err(DomainError::invariant(format!(
                    "alert {} is SENT without sent_at",
                    record.id
                )));
            }
            _ => {}
        }
        Ok(Self {
            id: record.id,
            alert_type: record.alert_type,
            severity: record.severity,
            status: record.status,
            farm_id: record.farm_id,
            season_id: record.season_id,
            plot_id: record.plot_id,
            crop_id: record.crop_id,
            title: record.title,
            message: record.message,
            suggested_action_type: record.suggested_action_type,
            suggested_action_url: record.suggested_action_url,
            recipient_farmer_ids: record.recipient_farmer_ids,
            created_at: record.created_at,
            updated_at: record.updated_at,
            sent_at: record.sent_at,
        })
    }

    pub fn to_record(&self) -> AlertRecord {
        AlertRecord {
            id: self.id,
            alert_type: self.alert_type,
            severity: self.severity,
            status: self.status,
            farm_id: self.farm_id,
            season_id: self.season_id,
            plot_id: self.plot_id,
            crop_id: self.crop_id,
            title: self.title.clone(),
            message: self.message.clone(),
            suggested_action_type: self.suggested_action_type.clone(),
            suggested_action_url: self.suggested_action_url.clone(),
            recipient_farmer_ids: self.recipient_farmer_ids.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            sent_at: self.sent_at,
        }
    }

    pub fn id(&self) -> AlertId {
        self.id
    }

    pub fn alert_type(&self) -> AlertType {
        self.alert_type
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn status(&self) -> AlertStatus {
        self.status
    }

    pub fn farm_id(&self) -> FarmId {
        self.farm_id
    }

    pub fn season_id(&self) -> Option<SeasonId> {
        self.season_id
    }

    pub fn plot_id(&self) -> Option<PlotId> {
        self.plot_id
    }

    pub fn crop_id(&self) -> Option<CropId> {
        self.crop_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn suggested_action_type(&self) -> &str {
        &self.suggested_action_type
    }

    pub fn suggested_action_url(&self) -> &str {
        &self.suggested_action_url
    }

    pub fn recipient_farmer_ids(&self) -> &[UserId] {
        &self.recipient_farmer_ids
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        self.sent_at
    }

    /// Calendar day of creation in the given offset (the dedup bucket day).
    pub fn dedup_date(&self, offset: FixedOffset) -> NaiveDate {
        self.created_at.with_timezone(&offset).date_naive()
    }

    /// Only a NEW alert can be sent; anything else is a conflict.
    pub fn ensure_sendable(&self) -> DomainResult<()> {
        match self.status {
            AlertStatus::New => Ok(()),
            AlertStatus::Sent => Err(DomainError::conflict(format!("alert {} was already sent", self.id))),
            other => Err(DomainError::conflict(format!(
                "alert {} cannot be sent from status {}",
                self.id,
                other.as_str()
            ))),
        }
    }

    /// `NEW → SENT`. Records the resolved recipients and sets `sent_at` once.
    pub fn mark_sent(&mut self, recipients: Vec<UserId>, at: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_sendable()?;
        self.recipient_farmer_ids = recipients;
        self.status = AlertStatus::Sent;
        self.sent_at = Some(at);
        self.updated_at = at;
        Ok(())
    }

    /// `NEW | SENT → ACKNOWLEDGED`.
    pub fn acknowledge(&mut self, at: DateTime<Utc>) -> DomainResult<()> {
        self.transition(
            &[AlertStatus::New, AlertStatus::Sent],
            AlertStatus::Acknowledged,
            at,
        )
    }

    /// `NEW | SENT | ACKNOWLEDGED → RESOLVED`.
    pub fn resolve(&mut self, at: DateTime<Utc>) -> DomainResult<()> {
        self.transition(
            &[AlertStatus::New, AlertStatus::Sent, AlertStatus::Acknowledged],
            AlertStatus::Resolved,
            at,
        )
    }

    /// `NEW | SENT | ACKNOWLEDGED → DISMISSED`.
    pub fn dismiss(&mut self, at: DateTime<Utc>) -> DomainResult<()> {
        self.transition(
            &[AlertStatus::New, AlertStatus::Sent, AlertStatus::Acknowledged],
            AlertStatus::Dismissed,
            at,
        )
    }

    fn transition(
        &mut self,
        from: &[AlertStatus],
        to: AlertStatus,
        at: DateTime<Utc>,
    ) -> DomainResult<()> {
        if !from.contains(&self.status) {
            return Err(DomainError::conflict(format!(
                "alert {} cannot move from {} to {}",
                self.id,
                self.status.as_str(),
                to.as_str()
            )));
        }
        self.status = to;
        self.updated_at = at;
        Ok(())
    }
}
