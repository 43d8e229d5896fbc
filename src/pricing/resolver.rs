//! Pure pricing resolution over a set of possibly-overlapping rules.
//!
//! The interval is split at every instant where the winning rule could
//! change (midnights and rule window edges), a winner is picked per slice,
//! and adjacent slices won by the same rule are merged back together. The
//! smallest addressable unit is one minute.
//!
//! Winner selection among matching rules: highest `priority` wins; on a tie
//! the more specific scope wins (court-scoped over global, then day-scoped
//! over every-day); on a full tie the lowest rule id wins. The tie-break is
//! a deterministic default, not a contract with any one deployment; change
//! [`rank`] to change the policy.

use chrono::{Datelike, Duration, NaiveDateTime, NaiveTime, Timelike};
use std::cmp::Ordering;
use std::collections::BTreeSet;

use super::errors::{PricingError, PricingResult};
use super::models::{PriceQuote, PriceSegment, PricingRule};
use crate::courts::CourtId;
use crate::wallet::Money;

/// Compare two rules that both match a slice; `Greater` means `a` wins.
fn rank(a: &PricingRule, b: &PricingRule) -> Ordering {
    a.priority
        .cmp(&b.priority)
        .then(a.specificity().cmp(&b.specificity()))
        .then(b.id.cmp(&a.id))
}

/// Price a venue-local interval `[start, end)` against a rule set.
///
/// Returns a schedule of constant-price segments whose durations sum to the
/// full interval. Fails with [`PricingError::NoRuleCovers`] when any slice
/// has no matching active rule.
pub fn resolve_schedule(
    rules: &[PricingRule],
    court_id: CourtId,
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> PricingResult<PriceQuote> {
    if start >= end {
        return Err(PricingError::EmptyInterval);
    }

    let boundaries = slice_boundaries(rules, court_id, start, end);

    let mut segments: Vec<PriceSegment> = Vec::new();
    let mut points = boundaries.iter().peekable();
    while let (Some(&t1), Some(&&t2)) = (points.next(), points.peek()) {
        let winner = winning_rule(rules, court_id, t1)
            .ok_or(PricingError::NoRuleCovers { court_id, at: t1 })?;

        match segments.last_mut() {
            Some(last) if last.rule_id == winner.id => last.end = t2,
            _ => segments.push(PriceSegment {
                start: t1,
                end: t2,
                rule_id: winner.id,
                price_per_hour: winner.price_per_hour,
                price: 0,
            }),
        }
    }

    let mut total: Money = 0;
    for segment in &mut segments {
        let minutes = (segment.end - segment.start).num_minutes();
        segment.price = segment.price_per_hour * minutes / 60;
        total += segment.price;
    }

    Ok(PriceQuote { segments, total })
}

/// The winning rule at a single venue-local instant, if any.
pub fn winning_rule<'a>(
    rules: &'a [PricingRule],
    court_id: CourtId,
    at: NaiveDateTime,
) -> Option<&'a PricingRule> {
    let day_of_week = at.weekday().num_days_from_sunday() as i16;
    let minute = (at.time().num_seconds_from_midnight() / 60) as i32;

    rules
        .iter()
        .filter(|r| {
            r.is_active && r.matches_scope(court_id, day_of_week) && r.covers_minute(minute)
        })
        .max_by(|a, b| rank(a, b))
}

/// Every instant in `(start, end)` where the winning rule could change,
/// plus the interval endpoints: each touched midnight and each matching
/// rule's window edges, clipped to the interval.
fn slice_boundaries(
    rules: &[PricingRule],
    court_id: CourtId,
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> BTreeSet<NaiveDateTime> {
    let mut boundaries = BTreeSet::new();
    boundaries.insert(start);
    boundaries.insert(end);

    let mut day = start.date();
    while day <= end.date() {
        let day_start = day.and_time(NaiveTime::MIN);
        if start < day_start && day_start < end {
            boundaries.insert(day_start);
        }
        let day_of_week = day.weekday().num_days_from_sunday() as i16;

        for rule in rules.iter().filter(|r| r.is_active) {
            if !rule.matches_scope(court_id, day_of_week) {
                continue;
            }
            for minute in [rule.start_minute, rule.end_minute] {
                let t = day_start + Duration::minutes(i64::from(minute));
                if start < t && t < end {
                    boundaries.insert(t);
                }
            }
        }

        let Some(next) = day.succ_opt() else { break };
        day = next;
    }

    boundaries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::models::MINUTES_PER_DAY;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn rule(id: i64, start_minute: i32, end_minute: i32, price: Money) -> PricingRule {
        PricingRule {
            id,
            court_id: None,
            day_of_week: None,
            start_minute,
            end_minute,
            price_per_hour: price,
            priority: 0,
            is_active: true,
        }
    }

    fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 8, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn interval_crossing_rule_boundary_is_split_and_summed() {
        // 50,000/h before 17:00, 80,000/h from 17:00.
        let rules = vec![rule(1, 0, 17 * 60, 50_000), rule(2, 17 * 60, 22 * 60, 80_000)];

        let quote = resolve_schedule(&rules, 1, at(21, 16, 30), at(21, 18, 30)).unwrap();

        assert_eq!(quote.segments.len(), 2);
        assert_eq!(quote.segments[0].price, 25_000);
        assert_eq!(quote.segments[1].price, 120_000);
        assert_eq!(quote.total, 145_000);
    }

    #[test]
    fn higher_priority_rule_wins_inside_overlap() {
        let base = rule(1, 0, MINUTES_PER_DAY, 50_000);
        let mut peak = rule(2, 17 * 60, 22 * 60, 80_000);
        peak.priority = 10;

        let quote = resolve_schedule(&[base, peak], 1, at(21, 18, 0), at(21, 19, 0)).unwrap();
        assert_eq!(quote.segments.len(), 1);
        assert_eq!(quote.segments[0].rule_id, 2);
        assert_eq!(quote.total, 80_000);
    }

    #[test]
    fn court_scoped_rule_beats_global_on_priority_tie() {
        let global = rule(1, 0, MINUTES_PER_DAY, 50_000);
        let mut scoped = rule(2, 0, MINUTES_PER_DAY, 70_000);
        scoped.court_id = Some(3);

        let quote =
            resolve_schedule(&[global.clone(), scoped], 3, at(21, 10, 0), at(21, 11, 0)).unwrap();
        assert_eq!(quote.segments[0].rule_id, 2);

        // The scoped rule never applies to another court.
        let mut scoped = rule(2, 0, MINUTES_PER_DAY, 70_000);
        scoped.court_id = Some(3);
        let quote = resolve_schedule(&[global, scoped], 4, at(21, 10, 0), at(21, 11, 0)).unwrap();
        assert_eq!(quote.segments[0].rule_id, 1);
    }

    #[test]
    fn fully_overlapping_equal_rules_resolve_to_lowest_id() {
        let quote = resolve_schedule(
            &[rule(7, 0, MINUTES_PER_DAY, 60_000), rule(4, 0, MINUTES_PER_DAY, 90_000)],
            1,
            at(21, 9, 0),
            at(21, 10, 0),
        )
        .unwrap();
        assert_eq!(quote.segments[0].rule_id, 4);
        assert_eq!(quote.total, 90_000);
    }

    #[test]
    fn uncovered_slice_is_a_configuration_error() {
        // Coverage ends at 17:00; pricing past it must fail, not guess.
        let rules = vec![rule(1, 8 * 60, 17 * 60, 50_000)];
        let err = resolve_schedule(&rules, 1, at(21, 16, 0), at(21, 18, 0)).unwrap_err();
        assert!(matches!(err, PricingError::NoRuleCovers { .. }));
    }

    #[test]
    fn midnight_crossing_splits_on_day_scoped_rules() {
        // Friday 2026-08-21 23:00 .. Saturday 01:00. Saturday (dow 6) has a
        // higher-priority weekend rate.
        let base = rule(1, 0, MINUTES_PER_DAY, 50_000);
        let mut weekend = rule(2, 0, MINUTES_PER_DAY, 80_000);
        weekend.day_of_week = Some(6);
        weekend.priority = 5;

        let quote = resolve_schedule(&[base, weekend], 1, at(21, 23, 0), at(22, 1, 0)).unwrap();
        assert_eq!(quote.segments.len(), 2);
        assert_eq!(quote.total, 50_000 + 80_000);
    }

    #[test]
    fn window_edges_are_half_open() {
        // A booking starting exactly where a window ends belongs to the next
        // window only.
        let rules = vec![rule(1, 0, 17 * 60, 50_000), rule(2, 17 * 60, 24 * 60, 80_000)];
        let quote = resolve_schedule(&rules, 1, at(21, 17, 0), at(21, 18, 0)).unwrap();
        assert_eq!(quote.segments.len(), 1);
        assert_eq!(quote.segments[0].rule_id, 2);
    }

    #[test]
    fn inactive_rules_are_ignored() {
        let mut r = rule(1, 0, MINUTES_PER_DAY, 50_000);
        r.is_active = false;
        assert!(resolve_schedule(&[r], 1, at(21, 10, 0), at(21, 11, 0)).is_err());
    }

    #[test]
    fn empty_interval_is_rejected() {
        let rules = vec![rule(1, 0, MINUTES_PER_DAY, 50_000)];
        assert!(matches!(
            resolve_schedule(&rules, 1, at(21, 10, 0), at(21, 10, 0)),
            Err(PricingError::EmptyInterval)
        ));
    }

    proptest! {
        /// Segments tile the interval exactly and the total is the sum of
        /// the per-segment prices.
        #[test]
        fn segments_tile_interval(
            start_min in 0i64..(2 * 24 * 60 - 1),
            len in 1i64..(24 * 60),
            peak_start in 0i32..(24 * 60 - 1),
            peak_len in 1i32..(12 * 60),
        ) {
            let base = rule(1, 0, MINUTES_PER_DAY, 50_000);
            let mut peak = rule(2, peak_start, (peak_start + peak_len).min(MINUTES_PER_DAY), 80_000);
            peak.priority = 10;

            let origin = at(1, 0, 0);
            let start = origin + Duration::minutes(start_min);
            let end = start + Duration::minutes(len);

            let quote = resolve_schedule(&[base, peak], 1, start, end).unwrap();

            prop_assert_eq!(quote.segments.first().unwrap().start, start);
            prop_assert_eq!(quote.segments.last().unwrap().end, end);
            for pair in quote.segments.windows(2) {
                prop_assert_eq!(pair[0].end, pair[1].start);
            }
            let minutes: i64 = quote
                .segments
                .iter()
                .map(|s| (s.end - s.start).num_minutes())
                .sum();
            prop_assert_eq!(minutes, len);
            let sum: Money = quote.segments.iter().map(|s| s.price).sum();
            prop_assert_eq!(sum, quote.total);
        }
    }
}
