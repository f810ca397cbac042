// Forecast Engine - month-to-date totals and a linear month-end projection
// Pure function of the transactions and "now"; no store access, no wall clock.

use chrono::{DateTime, FixedOffset};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::calendar::{days_so_far, total_days_in_month};
use crate::models::Transaction;

// ============================================================================
// SUMMARY
// ============================================================================

/// Scalar forecast for one user and one month, created fresh per request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastSummary {
    /// Exact sum of amounts, not rounded
    #[serde(with = "rust_decimal::serde::float")]
    pub total_spent: Decimal,

    /// Spend per elapsed day, 2 dp
    #[serde(with = "rust_decimal::serde::float")]
    pub average_daily: Decimal,

    pub days_so_far: u32,

    pub total_days_in_month: u32,

    /// Projected month-end spend, 2 dp
    #[serde(with = "rust_decimal::serde::float")]
    pub forecast: Decimal,
}

/// Round to cents, halves away from zero
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Unrounded spend per day; zero elapsed days yields zero
pub fn average_daily(total_spent: Decimal, days_so_far: u32) -> Decimal {
    if days_so_far == 0 {
        return Decimal::ZERO;
    }
    total_spent / Decimal::from(days_so_far)
}

// ============================================================================
// ENGINE
// ============================================================================

/// Compute the month-to-date summary.
///
/// `transactions` must already be scoped to the user and to
/// `[start_of_month(now), now]`; no filtering happens here.
/// Sums and the projection saturate at `Decimal::MAX` instead of panicking.
pub fn compute_forecast(transactions: &[Transaction], now: &DateTime<FixedOffset>) -> ForecastSummary {
    let days_so_far = days_so_far(now);
    let total_days_in_month = total_days_in_month(now);

    let total_spent = transactions
        .iter()
        .fold(Decimal::ZERO, |sum, tx| sum.saturating_add(tx.amount));
    let average = average_daily(total_spent, days_so_far);
    let forecast = average.saturating_mul(Decimal::from(total_days_in_month));

    ForecastSummary {
        total_spent,
        average_daily: round2(average),
        days_so_far,
        total_days_in_month,
        forecast: round2(forecast),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(y, m, d, h, 0, 0)
            .unwrap()
    }

    fn spend(amount: Decimal, day: u32) -> Transaction {
        Transaction::new(
            amount,
            Utc.with_ymd_and_hms(2024, 3, day, 10, 0, 0).unwrap(),
            "General",
        )
    }

    #[test]
    fn test_march_leap_year_projection() {
        let transactions: Vec<Transaction> = (1..=15).map(|day| spend(dec!(10.00), day)).collect();
        let summary = compute_forecast(&transactions, &at(2024, 3, 15, 18));

        assert_eq!(summary.total_spent, dec!(150.00));
        assert_eq!(summary.average_daily, dec!(10.00));
        assert_eq!(summary.days_so_far, 15);
        assert_eq!(summary.total_days_in_month, 31);
        assert_eq!(summary.forecast, dec!(310.00));
    }

    #[test]
    fn test_first_instant_of_leap_february() {
        let summary = compute_forecast(&[], &at(2024, 2, 1, 0));

        assert_eq!(summary.days_so_far, 1);
        assert_eq!(summary.total_days_in_month, 29);
        assert_eq!(summary.total_spent, Decimal::ZERO);
        assert_eq!(summary.average_daily, Decimal::ZERO);
        assert_eq!(summary.forecast, Decimal::ZERO);
    }

    #[test]
    fn test_zero_day_guard() {
        assert_eq!(average_daily(dec!(500), 0), Decimal::ZERO);
        assert_eq!(average_daily(dec!(0), 0), Decimal::ZERO);
    }

    #[test]
    fn test_rounding_only_on_average_and_forecast() {
        // 100 / 12 = 8.333.. ; * 30 = 250 before rounding
        let transactions = vec![spend(dec!(20), 3), spend(dec!(30), 3), spend(dec!(50.005), 10)];
        let summary = compute_forecast(&transactions, &at(2024, 4, 12, 9));

        assert_eq!(summary.total_spent, dec!(100.005));
        assert_eq!(summary.average_daily, dec!(8.33));
        assert_eq!(summary.total_days_in_month, 30);
        assert_eq!(summary.forecast, dec!(250.01));
    }

    #[test]
    fn test_extreme_amounts_saturate() {
        let huge: Decimal = "10000000000000000000000000000".parse().unwrap();
        let summary = compute_forecast(&[spend(huge, 1)], &at(2024, 3, 1, 0));
        assert_eq!(summary.total_spent, huge);
        assert_eq!(summary.forecast, round2(Decimal::MAX));

        let summary = compute_forecast(&[spend(Decimal::MAX, 1), spend(Decimal::MAX, 2)], &at(2024, 3, 2, 0));
        assert_eq!(summary.total_spent, Decimal::MAX);
    }

    #[test]
    fn test_round2_midpoint() {
        assert_eq!(round2(dec!(1.005)), dec!(1.01));
        assert_eq!(round2(dec!(1.004)), dec!(1.00));
        assert_eq!(round2(dec!(7)), dec!(7));
    }

    #[test]
    fn test_sum_is_order_independent() {
        let forward = vec![spend(dec!(0.1), 1), spend(dec!(0.2), 2), spend(dec!(33.33), 3)];
        let mut reversed = forward.clone();
        reversed.reverse();
        let now = at(2024, 3, 3, 12);

        assert_eq!(compute_forecast(&forward, &now), compute_forecast(&reversed, &now));
        assert_eq!(compute_forecast(&forward, &now).total_spent, dec!(33.63));
    }

    #[test]
    fn test_projection_grows_with_month_length() {
        // Same spend and elapsed days, months of 28, 29, 30 and 31 days
        let transactions = vec![spend(dec!(45), 1)];
        let forecasts: Vec<Decimal> = [at(2023, 2, 10, 0), at(2024, 2, 10, 0), at(2024, 4, 10, 0), at(2024, 5, 10, 0)]
            .iter()
            .map(|now| compute_forecast(&transactions, now).forecast)
            .collect();

        assert!(forecasts.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(forecasts[0], dec!(126.00));
        assert_eq!(forecasts[3], dec!(139.50));
    }

    #[test]
    fn test_summary_json_shape() {
        let summary = compute_forecast(&[spend(dec!(150), 1)], &at(2024, 3, 15, 0));
        let json = serde_json::to_value(&summary).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "totalSpent": 150.0,
                "averageDaily": 10.0,
                "daysSoFar": 15,
                "totalDaysInMonth": 31,
                "forecast": 310.0,
            })
        );
    }
}
