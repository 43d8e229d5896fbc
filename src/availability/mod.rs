//! Availability module: deciding whether a court/time slot is free.

pub mod checker;

pub use checker::{AvailabilityChecker, find_conflicts_in, holds_slot, intervals_overlap};
