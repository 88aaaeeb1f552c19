//! Alert domain module.
//!
//! Pure domain logic for the alert lifecycle and its notifications:
//! - `alert`: the `Alert` entity and its finite-state machine
//! - `notification`: one notification per (alert, recipient)
//! - `policy`: data-driven severity thresholds
//! - `template`: alert type → title/message/action mapping
//! - `recipients`: delivery channel and recipient selection

pub mod alert;
pub mod notification;
pub mod policy;
pub mod recipients;
pub mod template;

pub use alert::{Alert, AlertRecord, AlertStatus, AlertType, NewAlert, Severity};
pub use notification::Notification;
pub use policy::{SeverityPolicy, SeverityScale, SeverityStep};
pub use recipients::{Channel, RecipientMode, SendRequest};
pub use template::{AlertContent, InventoryFinding, LinkContext, render_inventory_alert};
