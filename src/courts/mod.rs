//! Courts module: the fixed set of reservable resources.

pub mod manager;
pub mod models;

pub use manager::{CourtError, CourtManager, CourtResult};
pub use models::{Court, CourtId};
