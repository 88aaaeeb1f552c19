//! Engine services: compose the pure domain crates with collaborators and the
//! Alert Store.
//!
//! - `on_hand`: on-hand listings (lot and location grain)
//! - `risk`: risk summary and paginated risk-lot listing
//! - `refresh`: per-farm scan + dedup-guarded alert creation
//! - `send`: recipient resolution and notification fan-out
//! - `lifecycle`: alert queries and operator transitions, notification inbox

use std::sync::Arc;

use crate::clock::{Clock, local_date};
use crate::collaborators::{MovementLedger, RecipientDirectory, ReferenceData};
use crate::config::EngineConfig;
use crate::store::AlertStore;

pub mod fan_out;
pub mod lifecycle;
pub mod on_hand;
pub mod pagination;
pub mod refresh;
pub mod risk;
pub mod send;

pub use fan_out::NotificationFanOut;
pub use pagination::{Page, PageRequest};
pub use refresh::{FarmFailure, RefreshReport, RefreshedAlert};

/// The alert engine, wired to its collaborators and store.
#[derive(Clone)]
pub struct AlertEngine {
    config: Arc<EngineConfig>,
    clock: Arc<dyn Clock>,
    ledger: Arc<dyn MovementLedger>,
    reference: Arc<dyn ReferenceData>,
    directory: Arc<dyn RecipientDirectory>,
    store: Arc<dyn AlertStore>,
}

impl AlertEngine {
    pub fn new(
        config: EngineConfig,
        clock: Arc<dyn Clock>,
        ledger: Arc<dyn MovementLedger>,
        reference: Arc<dyn ReferenceData>,
        directory: Arc<dyn RecipientDirectory>,
        store: Arc<dyn AlertStore>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            clock,
            ledger,
            reference,
            directory,
            store,
        }
    }

    /// Calendar day in the configured offset.
    pub fn today(&self) -> chrono::NaiveDate {
        local_date(self.clock.now(), self.config.utc_offset)
    }
}
