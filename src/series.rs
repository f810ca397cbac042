// Chart Series Builder - cumulative actual vs projected spend, one point per day
//
// Day-of-month is read from each transaction's instant in the offset of `now`.
// Slicing the day out of a serialized date string would shift late-evening
// entries onto the neighbouring day for anyone not on UTC.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::calendar::{day_of_month, same_month};
use crate::forecast::{round2, ForecastSummary};
use crate::models::Transaction;

/// One calendar day of the chart.
/// Exactly one of `actual` / `forecast` is set: `actual` up to and including
/// `days_so_far`, `forecast` after it. Absent values serialize as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub day: u32,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub actual: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub forecast: Option<Decimal>,
}

// ============================================================================
// SCOPING & BUCKETING
// ============================================================================

/// Transactions whose date falls in `now`'s calendar month and year
pub fn scope_to_month<'a>(
    transactions: &'a [Transaction],
    now: &DateTime<FixedOffset>,
) -> Vec<&'a Transaction> {
    transactions
        .iter()
        .filter(|tx| same_month(&tx.date, now))
        .collect()
}

/// Sum of amounts per day-of-month. Days without spend have no entry.
pub fn bucket_by_day<'a, I>(transactions: I, offset: &FixedOffset) -> BTreeMap<u32, Decimal>
where
    I: IntoIterator<Item = &'a Transaction>,
{
    let mut buckets = BTreeMap::new();
    for tx in transactions {
        let bucket = buckets
            .entry(day_of_month(&tx.date, offset))
            .or_insert(Decimal::ZERO);
        *bucket = bucket.saturating_add(tx.amount);
    }
    buckets
}

// ============================================================================
// SERIES
// ============================================================================

/// Build the day-indexed chart series for `now`'s month.
///
/// Month length, elapsed days and the daily rate come from `summary`, so the
/// chart always agrees with the scalar forecast it is drawn next to.
/// Projection starts from the cumulative actual at `days_so_far`; spend dated
/// later in the month does not move the projected line.
pub fn build_series(
    transactions: &[Transaction],
    summary: &ForecastSummary,
    now: &DateTime<FixedOffset>,
) -> Vec<ChartPoint> {
    let scoped = scope_to_month(transactions, now);
    let buckets = bucket_by_day(scoped, now.offset());

    let mut points = Vec::with_capacity(summary.total_days_in_month as usize);
    let mut cumulative = Decimal::ZERO;
    let mut base = Decimal::ZERO;

    for day in 1..=summary.total_days_in_month {
        if day <= summary.days_so_far {
            if let Some(amount) = buckets.get(&day) {
                cumulative = cumulative.saturating_add(*amount);
            }
            base = cumulative;
            points.push(ChartPoint {
                day,
                actual: Some(cumulative),
                forecast: None,
            });
        } else {
            let ahead = Decimal::from(day - summary.days_so_far);
            points.push(ChartPoint {
                day,
                actual: None,
                forecast: Some(round2(
                    base.saturating_add(summary.average_daily.saturating_mul(ahead)),
                )),
            });
        }
    }

    points
}
