//! Recurring bookings: pattern expansion and batch generation.

pub mod generator;
pub mod models;

pub use generator::{MAX_OCCURRENCES, RecurringManager, occurrence_dates};
pub use models::{
    GroupCancelOutcome, OccurrenceSlot, RecurrencePattern, RecurringPreview, RecurringRequest,
    RecurringResult, SkippedOccurrence,
};
