//! Staff overrides: force updates, slot blocks, and their settlement.

pub mod models;
pub mod service;

pub use models::{AdminUpdateResult, ForceUpdate, OverrideOptions};
pub use service::AdminOverrideService;
