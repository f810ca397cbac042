// Spend Forecast - command line entry point

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing::info;

use spend_forecast::{
    config::StoreArgs, due_this_month, export_to_file, logging, month_report, Clock, NewExpense,
    NewSubscription, SqliteStore,
};

#[derive(Debug, Parser)]
#[command(name = "spend-forecast", version, about = "Month-end expense forecasting")]
struct Cli {
    #[command(flatten)]
    store: StoreArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Import expenses from a Category,Amount,Date[,Icon] CSV file
    Import {
        csv: PathBuf,
        #[arg(long)]
        user: String,
    },
    /// Add a single expense
    Add {
        #[arg(long)]
        user: String,
        #[arg(long)]
        category: String,
        #[arg(long)]
        amount: Decimal,
        /// YYYY-MM-DD or RFC 3339
        #[arg(long)]
        date: String,
        #[arg(long)]
        icon: Option<String>,
    },
    /// List expenses, newest first
    List {
        #[arg(long)]
        user: String,
    },
    /// Month-to-date totals and month-end projection
    Forecast {
        #[arg(long)]
        user: String,
        /// Print the full report (summary, series, categories) as JSON
        #[arg(long)]
        json: bool,
    },
    /// Cumulative actual vs projected spend, one line per day
    Series {
        #[arg(long)]
        user: String,
    },
    /// Month-to-date spend per category
    Categories {
        #[arg(long)]
        user: String,
    },
    /// Audit trail of one expense, including deleted ones
    History {
        #[arg(long)]
        user: String,
        id: String,
    },
    /// Add a recurring subscription
    Subscribe {
        #[arg(long)]
        user: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        amount: Decimal,
        /// YYYY-MM-DD or RFC 3339
        #[arg(long = "next-billing-date")]
        next_billing_date: String,
    },
    /// List subscriptions and what is still due this month
    Subscriptions {
        #[arg(long)]
        user: String,
    },
    /// Remove a subscription
    Unsubscribe {
        #[arg(long)]
        user: String,
        id: String,
    },
    /// Write all expenses to a workbook (.xlsx) or, for a .csv path, CSV
    Export {
        #[arg(long)]
        user: String,
        #[arg(long, default_value = spend_forecast::EXPORT_FILENAME)]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    logging::init_tracing();
    let cli = Cli::parse();

    let store = SqliteStore::open(&cli.store.db)?;
    let clock = cli.store.clock();

    match cli.command {
        Command::Import { csv, user } => {
            let expenses = spend_forecast::load_csv(&csv, &user, &cli.store.tz_offset)?;
            println!("📂 Loaded {} expenses from {}", expenses.len(), csv.display());

            let summary = store.import_expenses(&expenses)?;
            println!("✓ Inserted: {}", summary.inserted);
            println!("✓ Skipped duplicates: {}", summary.duplicates);
            println!("✓ {} now has {} expenses", user, store.count_expenses(&user)?);
        }
        Command::Add {
            user,
            category,
            amount,
            date,
            icon,
        } => {
            let expense = NewExpense {
                icon,
                category: Some(category),
                amount: Some(amount),
                date: Some(date),
            }
            .into_expense(&user, &cli.store.tz_offset)?;
            store.add_expense(&expense)?;
            println!("✓ Added {} {} on {}", expense.category, expense.amount, expense.date.date_naive());
        }
        Command::List { user } => {
            for expense in store.list_expenses(&user)? {
                println!(
                    "{}  {:<20} {:>12}  {}",
                    expense.date.with_timezone(&cli.store.tz_offset).date_naive(),
                    expense.category,
                    expense.amount,
                    expense.id
                );
            }
        }
        Command::Forecast { user, json } => {
            let now = clock.now();
            let report = month_report(&store, &user, &now)?;
            info!(user = %user, "forecast computed");

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                let s = &report.summary;
                println!("Expense forecast for {}", now.format("%B %Y"));
                println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
                println!("Spent so far:     {}", s.total_spent);
                println!("Avg. per day:     {}", s.average_daily);
                println!("Days passed:      {}/{}", s.days_so_far, s.total_days_in_month);
                println!("Projected total:  {}", s.forecast);
            }
        }
        Command::Series { user } => {
            let report = month_report(&store, &user, &clock.now())?;
            for point in report.series {
                match (point.actual, point.forecast) {
                    (Some(actual), _) => println!("{:>2}  actual    {}", point.day, actual),
                    (None, Some(forecast)) => println!("{:>2}  forecast  {}", point.day, forecast),
                    (None, None) => println!("{:>2}  -", point.day),
                }
            }
        }
        Command::Categories { user } => {
            let report = month_report(&store, &user, &clock.now())?;
            for total in report.categories {
                println!("{:<20} {:>12}  ({} expenses)", total.category, total.total, total.count);
            }
        }
        Command::History { user, id } => {
            for event in store.expense_history(&user, &id)? {
                println!("{}  {:<18} {}", event.timestamp.to_rfc3339(), event.event_type, event.data);
            }
        }
        Command::Subscribe {
            user,
            name,
            amount,
            next_billing_date,
        } => {
            let subscription = NewSubscription {
                name: Some(name),
                amount: Some(amount),
                next_billing_date: Some(next_billing_date),
            }
            .into_subscription(&user, &cli.store.tz_offset)?;
            store.add_subscription(&subscription)?;
            println!(
                "✓ Added {} {} next billed {}",
                subscription.name,
                subscription.amount,
                subscription.next_billing_date.date_naive()
            );
        }
        Command::Subscriptions { user } => {
            let subscriptions = store.list_subscriptions(&user)?;
            for s in &subscriptions {
                println!(
                    "{}  {:<20} {:>12}  {}",
                    s.next_billing_date.with_timezone(&cli.store.tz_offset).date_naive(),
                    s.name,
                    s.amount,
                    s.id
                );
            }
            let upcoming = due_this_month(&subscriptions, &clock.now());
            println!("Still due this month: {} ({} charges)", upcoming.total, upcoming.subscriptions.len());
        }
        Command::Unsubscribe { user, id } => {
            let removed = store.delete_subscription(&user, &id)?;
            println!("✓ Removed {}", removed.name);
        }
        Command::Export { user, out } => {
            let expenses = store.list_expenses(&user)?;
            export_to_file(&out, &expenses)?;
            println!("✓ Exported {} expenses to {}", expenses.len(), out.display());
        }
    }

    Ok(())
}
