//! Infrastructure layer: collaborators, alert store, config and engine services.

pub mod clock;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod services;
pub mod store;

#[cfg(test)]
mod integration_tests;
