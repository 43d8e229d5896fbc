//! Court data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::wallet::Money;

/// Court ID type
pub type CourtId = i64;

/// A physical court that can be reserved.
///
/// `base_price_per_hour` is informational only; booking cost always comes
/// from the pricing resolver, never from this field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Court {
    pub id: CourtId,
    pub name: String,
    pub base_price_per_hour: Money,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}
