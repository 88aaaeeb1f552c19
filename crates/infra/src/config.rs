//! Environment-driven configuration.
//!
//! Every key has a default; a value that is present but unparsable is an error
//! rather than being replaced by the default.

use std::net::SocketAddr;
use std::str::FromStr;

use chrono::{FixedOffset, Offset, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use agrisk_alerts::SeverityPolicy;
use agrisk_inventory::risk::MAX_WINDOW_DAYS;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0} must be set")]
    Missing(&'static str),
}

/// Tunables for risk scans and alert generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub default_window_days: i64,
    /// `None` disables the LOW_STOCK rule.
    pub low_stock_threshold: Option<Decimal>,
    pub top_n: usize,
    pub utc_offset: FixedOffset,
    pub action_base_url: String,
    pub severity: SeverityPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_window_days: 30,
            low_stock_threshold: None,
            top_n: 5,
            utc_offset: Utc.fix(),
            action_base_url: "/admin/inventory/lots".to_string(),
            severity: SeverityPolicy::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the process environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let mut severity = defaults.severity.clone();

        let default_window_days: i64 =
            parse_or(&lookup, "AGRISK_DEFAULT_WINDOW_DAYS", defaults.default_window_days)?;
        if default_window_days <= 0 || default_window_days > MAX_WINDOW_DAYS {
            return Err(invalid(
                "AGRISK_DEFAULT_WINDOW_DAYS",
                default_window_days.to_string(),
                format!("must be between 1 and {MAX_WINDOW_DAYS}"),
            ));
        }

        let low_stock_threshold: Option<Decimal> = parse_opt(&lookup, "AGRISK_LOW_STOCK_THRESHOLD")?;
        if low_stock_threshold.is_some_and(|t| t <= Decimal::ZERO) {
            return Err(invalid(
                "AGRISK_LOW_STOCK_THRESHOLD",
                format!("{low_stock_threshold:?}"),
                "must be positive".to_string(),
            ));
        }

        let top_n: usize = parse_or(&lookup, "AGRISK_TOP_N", defaults.top_n)?;

        let offset_minutes: i32 = parse_or(&lookup, "AGRISK_UTC_OFFSET_MINUTES", 0)?;
        let utc_offset = offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                invalid(
                    "AGRISK_UTC_OFFSET_MINUTES",
                    offset_minutes.to_string(),
                    "offset out of range".to_string(),
                )
            })?;

        let action_base_url = lookup("AGRISK_ACTION_BASE_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.action_base_url);

        if let Some(step) = severity.expired.steps.first_mut() {
            step.min_lots = Some(parse_or(&lookup, "AGRISK_EXPIRED_CRITICAL_LOTS", 5)?);
            step.min_qty = Some(parse_or(&lookup, "AGRISK_EXPIRED_CRITICAL_QTY", Decimal::from(100))?);
        }
        if let Some(step) = severity.expiring.steps.get_mut(0) {
            step.min_lots = Some(parse_or(&lookup, "AGRISK_EXPIRING_MEDIUM_LOTS", 3)?);
            step.min_qty = Some(parse_or(&lookup, "AGRISK_EXPIRING_MEDIUM_QTY", Decimal::from(50))?);
        }
        if let Some(step) = severity.expiring.steps.get_mut(1) {
            step.min_lots = Some(parse_or(&lookup, "AGRISK_EXPIRING_HIGH_LOTS", 10)?);
        }
        severity.validate().map_err(|e| ConfigError::Invalid {
            key: "AGRISK_SEVERITY_*",
            value: String::new(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            default_window_days,
            low_stock_threshold,
            top_n,
            utc_offset,
            action_base_url,
            severity,
        })
    }
}

/// Which store adapters the process wires up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    InMemory,
    Postgres { database_url: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub bind_addr: SocketAddr,
    pub backend: StoreBackend,
}

impl RuntimeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_addr = parse_or(
            &lookup,
            "BIND_ADDR",
            SocketAddr::from(([0, 0, 0, 0], 8080)),
        )?;

        let use_persistent: bool = parse_or(&lookup, "USE_PERSISTENT_STORES", false)?;
        let backend = if use_persistent {
            let database_url = lookup("DATABASE_URL")
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing("DATABASE_URL"))?;
            StoreBackend::Postgres { database_url }
        } else {
            StoreBackend::InMemory
        };

        Ok(Self { bind_addr, backend })
    }
}

fn invalid(key: &'static str, value: String, reason: String) -> ConfigError {
    ConfigError::Invalid { key, value, reason }
}

fn parse_opt<F, T>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| invalid(key, raw.clone(), e.to_string())),
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    Ok(parse_opt(lookup, key)?.unwrap_or(default))
}
