// Month Report - one store read, then the pure forecast, series and breakdown

use anyhow::Result;
use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use tracing::debug;

use crate::breakdown::{category_breakdown, CategoryTotal};
use crate::calendar::month_to_date_window;
use crate::forecast::{compute_forecast, ForecastSummary};
use crate::series::{build_series, ChartPoint};
use crate::store::TransactionStore;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthReport {
    pub summary: ForecastSummary,
    pub series: Vec<ChartPoint>,
    pub categories: Vec<CategoryTotal>,
}

/// Forecast plus chart series and category totals for `user_id`'s current month.
/// A failed store read fails the whole report.
pub fn month_report<S>(store: &S, user_id: &str, now: &DateTime<FixedOffset>) -> Result<MonthReport>
where
    S: TransactionStore + ?Sized,
{
    let (start, end) = month_to_date_window(now);
    let transactions = store.find_by_user_and_date_range(user_id, &start, &end)?;
    debug!(user = user_id, count = transactions.len(), "month-to-date transactions loaded");

    let summary = compute_forecast(&transactions, now);
    let series = build_series(&transactions, &summary, now);
    let categories = category_breakdown(&transactions);

    Ok(MonthReport {
        summary,
        series,
        categories,
    })
}

/// Summary only
pub fn forecast_for_user<S>(store: &S, user_id: &str, now: &DateTime<FixedOffset>) -> Result<ForecastSummary>
where
    S: TransactionStore + ?Sized,
{
    let (start, end) = month_to_date_window(now);
    let transactions = store.find_by_user_and_date_range(user_id, &start, &end)?;
    Ok(compute_forecast(&transactions, now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Transaction;
    use anyhow::anyhow;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use std::cell::RefCell;

    /// Records the window it was asked for
    struct StubStore {
        rows: Vec<Transaction>,
        asked: RefCell<Vec<(DateTime<Utc>, DateTime<Utc>)>>,
    }

    impl TransactionStore for StubStore {
        fn find_by_user_and_date_range(
            &self,
            _user_id: &str,
            start: &DateTime<Utc>,
            end: &DateTime<Utc>,
        ) -> Result<Vec<Transaction>> {
            self.asked.borrow_mut().push((*start, *end));
            Ok(self
                .rows
                .iter()
                .filter(|tx| tx.date >= *start && tx.date <= *end)
                .cloned()
                .collect())
        }
    }

    struct FailingStore;

    impl TransactionStore for FailingStore {
        fn find_by_user_and_date_range(
            &self,
            _user_id: &str,
            _start: &DateTime<Utc>,
            _end: &DateTime<Utc>,
        ) -> Result<Vec<Transaction>> {
            Err(anyhow!("connection reset"))
        }
    }

    fn now() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 15, 12, 0, 0)
            .unwrap()
    }

    fn spend(amount: rust_decimal::Decimal, d: u32, category: &str) -> Transaction {
        Transaction::new(amount, Utc.with_ymd_and_hms(2024, 3, d, 9, 0, 0).unwrap(), category)
    }

    #[test]
    fn test_report_uses_month_to_date_window() {
        let store = StubStore {
            rows: vec![
                spend(dec!(100), 1, "Rent"),
                spend(dec!(50), 10, "Food"),
                spend(dec!(999), 20, "Travel"),
            ],
            asked: RefCell::new(Vec::new()),
        };

        let report = month_report(&store, "alice", &now()).unwrap();

        assert_eq!(
            store.asked.borrow()[0],
            (
                Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap()
            )
        );
        assert_eq!(report.summary.total_spent, dec!(150));
        assert_eq!(report.summary.forecast, dec!(310.00));
        assert_eq!(report.series.len(), 31);
        assert_eq!(report.series[14].actual, Some(dec!(150)));
        assert_eq!(report.categories.len(), 2);
        assert_eq!(report.categories[0].category, "Rent");
    }

    #[test]
    fn test_store_failure_yields_no_summary() {
        assert!(month_report(&FailingStore, "alice", &now()).is_err());
        let err = forecast_for_user(&FailingStore, "alice", &now()).unwrap_err();
        assert_eq!(err.to_string(), "connection reset");
    }
}
