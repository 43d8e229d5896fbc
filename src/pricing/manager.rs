//! Pricing manager: loads active rules and prices booking intervals.

use super::{
    errors::PricingResult,
    models::{PriceQuote, PricingRule},
    resolver::resolve_schedule,
};
use chrono::{DateTime, FixedOffset, Utc};
use sqlx::{PgPool, Row};
use std::sync::Arc;

use crate::courts::CourtId;

/// Pricing manager
///
/// Rules are stored in venue-local wall time; instants arrive as UTC and are
/// converted through the configured venue offset before resolution.
#[derive(Clone)]
pub struct PricingManager {
    pool: Arc<PgPool>,
    venue_offset: FixedOffset,
}

impl PricingManager {
    /// Create a new pricing manager
    ///
    /// Reads `VENUE_UTC_OFFSET_MINUTES` (default 0) for the venue's wall
    /// clock offset.
    pub fn new(pool: Arc<PgPool>) -> Self {
        let offset_minutes: i32 = std::env::var("VENUE_UTC_OFFSET_MINUTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);

        Self {
            pool,
            venue_offset: FixedOffset::east_opt(offset_minutes * 60)
                .unwrap_or_else(|| FixedOffset::east_opt(0).expect("zero offset is valid")),
        }
    }

    /// Override the venue offset (tests, multi-venue deployments).
    pub fn with_offset(mut self, venue_offset: FixedOffset) -> Self {
        self.venue_offset = venue_offset;
        self
    }

    /// Price a UTC interval `[start, end)` on a court.
    ///
    /// # Errors
    ///
    /// * `PricingError::NoRuleCovers` - Some slice has no matching rule
    /// * `PricingError::EmptyInterval` - `end <= start`
    pub async fn quote(
        &self,
        court_id: CourtId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> PricingResult<PriceQuote> {
        let rules = self.load_active_rules(court_id).await?;
        self.resolve(&rules, court_id, start, end)
    }

    /// Price an interval using a caller-owned transaction, so admin rewrites
    /// can re-price and settle in the same commit.
    pub(crate) async fn quote_in_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        court_id: CourtId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> PricingResult<PriceQuote> {
        let rules = Self::fetch_active_rules(&mut **tx, court_id).await?;
        self.resolve(&rules, court_id, start, end)
    }

    fn resolve(
        &self,
        rules: &[PricingRule],
        court_id: CourtId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> PricingResult<PriceQuote> {
        let local_start = start.with_timezone(&self.venue_offset).naive_local();
        let local_end = end.with_timezone(&self.venue_offset).naive_local();
        resolve_schedule(rules, court_id, local_start, local_end)
    }

    /// Load the active rules that could apply to a court.
    pub async fn load_active_rules(&self, court_id: CourtId) -> PricingResult<Vec<PricingRule>> {
        Self::fetch_active_rules(self.pool.as_ref(), court_id).await
    }

    async fn fetch_active_rules<'e, E>(executor: E, court_id: CourtId) -> PricingResult<Vec<PricingRule>>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let rows = sqlx::query(
            r#"
            SELECT id, court_id, day_of_week, start_minute, end_minute,
                   price_per_hour, priority, is_active
            FROM pricing_rules
            WHERE is_active AND (court_id IS NULL OR court_id = $1)
            ORDER BY priority DESC, id ASC
            "#,
        )
        .bind(court_id)
        .fetch_all(executor)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| PricingRule {
                id: row.get("id"),
                court_id: row.get("court_id"),
                day_of_week: row.get("day_of_week"),
                start_minute: row.get("start_minute"),
                end_minute: row.get("end_minute"),
                price_per_hour: row.get("price_per_hour"),
                priority: row.get("priority"),
                is_active: row.get("is_active"),
            })
            .collect())
    }
}
