// Spend Forecast - Core Library
// Month-to-date expense forecasting, chart series and the store/API around them

pub mod breakdown;
pub mod calendar;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod forecast;
pub mod logging;
pub mod models;
pub mod report;
pub mod series;
pub mod store;
pub mod subscription;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use breakdown::{category_breakdown, CategoryTotal};
pub use calendar::{days_in_month, month_to_date_window, start_of_month};
pub use clock::{Clock, FixedClock, SystemClock};
pub use db::{load_csv, ImportSummary};
pub use error::ExpenseError;
pub use export::{export_to_file, to_csv_bytes, to_xlsx_bytes, CSV_EXPORT_FILENAME, EXPORT_FILENAME};
pub use forecast::{compute_forecast, ForecastSummary};
pub use models::{Event, Expense, NewExpense, Transaction};
pub use report::{forecast_for_user, month_report, MonthReport};
pub use series::{build_series, ChartPoint};
pub use store::{SqliteStore, TransactionStore};
pub use subscription::{due_this_month, NewSubscription, Subscription, UpcomingCharges};

/// Crate version, reported by the health endpoint
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
