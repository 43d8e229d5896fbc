//! Pricing module: rule-based per-hour pricing with priority resolution.
//!
//! Rules may overlap; no disjointness is required of configuration. The
//! resolver slices an interval wherever the winning rule changes and sums
//! `duration × price_per_hour` per slice. An interval any slice of which no
//! rule covers cannot be priced and fails the whole request.

pub mod errors;
pub mod manager;
pub mod models;
pub mod resolver;

pub use errors::{PricingError, PricingResult};
pub use manager::PricingManager;
pub use models::{MINUTES_PER_DAY, PriceQuote, PriceSegment, PricingRule, RuleId};
pub use resolver::{resolve_schedule, winning_rule};
