use core::str::FromStr;

use serde::{Deserialize, Serialize};

use agrisk_core::{DomainError, DomainResult, UserId};

/// Delivery channel. Only in-app delivery exists.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Channel {
    InApp,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::InApp => "IN_APP",
        }
    }
}

impl FromStr for Channel {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "IN_APP" => Ok(Channel::InApp),
            other => Err(DomainError::validation(format!("unsupported channel '{other}'"))),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecipientMode {
    AllFarmersInFarm,
    SelectedFarmers,
}

impl RecipientMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecipientMode::AllFarmersInFarm => "ALL_FARMERS_IN_FARM",
            RecipientMode::SelectedFarmers => "SELECTED_FARMERS",
        }
    }
}

impl FromStr for RecipientMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ALL_FARMERS_IN_FARM" => Ok(RecipientMode::AllFarmersInFarm),
            "SELECTED_FARMERS" => Ok(RecipientMode::SelectedFarmers),
            other => Err(DomainError::validation(format!("unknown recipient mode '{other}'"))),
        }
    }
}

/// Validated send command.
///
/// `selected` is deduplicated in request order and is only meaningful for
/// `SELECTED_FARMERS`; it is ignored for farm-wide delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendRequest {
    channel: Channel,
    mode: RecipientMode,
    selected: Vec<UserId>,
}

impl SendRequest {
    pub fn new(
        channel: Channel,
        mode: RecipientMode,
        recipient_farmer_ids: Option<Vec<UserId>>,
    ) -> DomainResult<Self> {
        let selected = match mode {
            RecipientMode::AllFarmersInFarm => Vec::new(),
            RecipientMode::SelectedFarmers => {
                let ids = dedupe(recipient_farmer_ids.unwrap_or_default());
                if ids.is_empty() {
                    return Err(DomainError::validation(
                        "SELECTED_FARMERS requires at least one recipientFarmerId",
                    ));
                }
                ids
            }
        };
        Ok(Self {
            channel,
            mode,
            selected,
        })
    }

    /// Parse wire tokens and build the request.
    pub fn parse(
        channel: &str,
        mode: &str,
        recipient_farmer_ids: Option<Vec<UserId>>,
    ) -> DomainResult<Self> {
        Self::new(channel.parse()?, mode.parse()?, recipient_farmer_ids)
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn mode(&self) -> RecipientMode {
        self.mode
    }

    pub fn selected(&self) -> &[UserId] {
        &self.selected
    }
}

fn dedupe(ids: Vec<UserId>) -> Vec<UserId> {
    let mut out: Vec<UserId> = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}
