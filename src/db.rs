// Expense Database - SQLite persistence for expenses, subscriptions and their audit trail

use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use rusqlite::{params, Connection, Row};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::ExpenseError;
use crate::models::{Event, Expense, NewExpense, Transaction};
use crate::subscription::Subscription;

/// Fixed-width UTC text so lexicographic order equals time order
fn encode_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn decode_time(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e)))
}

fn decode_amount(idx: usize, raw: &str) -> rusqlite::Result<Decimal> {
    Decimal::from_str(raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e)))
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    // WAL is a no-op for in-memory databases
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // ==========================================================================
    // Expenses Table
    // import_hash is NULL for expenses added by hand, so identical manual
    // entries are allowed while re-imports are skipped.
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS expenses (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            icon TEXT,
            category TEXT NOT NULL,
            amount TEXT NOT NULL,
            date TEXT NOT NULL,
            created_at TEXT NOT NULL,
            import_hash TEXT UNIQUE
        )",
        [],
    )?;

    // ==========================================================================
    // Subscriptions Table
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS subscriptions (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            name TEXT NOT NULL,
            amount TEXT NOT NULL,
            next_billing_date TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Events Table (audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_expenses_user_date ON expenses(user_id, date)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_subscriptions_user ON subscriptions(user_id, next_billing_date)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// WRITES
// ============================================================================

/// Insert one hand-entered expense
pub fn insert_expense(conn: &Connection, expense: &Expense) -> Result<()> {
    insert_row(conn, expense, None)?;
    record_change(conn, "expense_added", expense)?;
    debug!(id = %expense.id, user = %expense.user_id, "expense added");
    Ok(())
}

/// Outcome of a bulk import
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImportSummary {
    pub inserted: usize,
    pub duplicates: usize,
}

/// Insert imported expenses, skipping rows already imported for the same user
pub fn import_expenses(conn: &Connection, expenses: &[Expense]) -> Result<ImportSummary> {
    let mut summary = ImportSummary::default();

    for expense in expenses {
        let hash = expense.compute_idempotency_hash();

        match insert_row(conn, expense, Some(&hash)) {
            Ok(()) => {
                summary.inserted += 1;
                record_change(conn, "expense_imported", expense)?;
            }
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                summary.duplicates += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    info!(
        inserted = summary.inserted,
        duplicates = summary.duplicates,
        "import finished"
    );

    Ok(summary)
}

fn insert_row(conn: &Connection, expense: &Expense, import_hash: Option<&str>) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO expenses (id, user_id, icon, category, amount, date, created_at, import_hash)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            expense.id,
            expense.user_id,
            expense.icon,
            expense.category,
            expense.amount.to_string(),
            encode_time(&expense.date),
            encode_time(&expense.created_at),
            import_hash,
        ],
    )?;
    Ok(())
}

/// Delete one of `user_id`'s expenses
pub fn delete_expense(conn: &Connection, user_id: &str, id: &str) -> Result<Expense> {
    let expense = get_expense(conn, user_id, id)?
        .ok_or_else(|| ExpenseError::expense_not_found(id))?;

    conn.execute(
        "DELETE FROM expenses WHERE id = ?1 AND user_id = ?2",
        params![id, user_id],
    )?;
    record_change(conn, "expense_deleted", &expense)?;

    Ok(expense)
}

fn record_change(conn: &Connection, event_type: &str, expense: &Expense) -> Result<()> {
    let event = Event::new(
        event_type,
        "expense",
        &expense.id,
        serde_json::json!({
            "category": expense.category,
            "amount": expense.amount.to_string(),
            "date": encode_time(&expense.date),
        }),
        &expense.user_id,
    );
    insert_event(conn, &event)
}

/// Insert one subscription
pub fn insert_subscription(conn: &Connection, subscription: &Subscription) -> Result<()> {
    conn.execute(
        "INSERT INTO subscriptions (id, user_id, name, amount, next_billing_date, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            subscription.id,
            subscription.user_id,
            subscription.name,
            subscription.amount.to_string(),
            encode_time(&subscription.next_billing_date),
            encode_time(&subscription.created_at),
        ],
    )?;
    record_subscription_change(conn, "subscription_added", subscription)?;
    debug!(id = %subscription.id, user = %subscription.user_id, "subscription added");
    Ok(())
}

/// Delete one of `user_id`'s subscriptions
pub fn delete_subscription(conn: &Connection, user_id: &str, id: &str) -> Result<Subscription> {
    let subscription = get_subscription(conn, user_id, id)?
        .ok_or_else(|| ExpenseError::subscription_not_found(id))?;

    conn.execute(
        "DELETE FROM subscriptions WHERE id = ?1 AND user_id = ?2",
        params![id, user_id],
    )?;
    record_subscription_change(conn, "subscription_deleted", &subscription)?;

    Ok(subscription)
}

fn record_subscription_change(conn: &Connection, event_type: &str, subscription: &Subscription) -> Result<()> {
    let event = Event::new(
        event_type,
        "subscription",
        &subscription.id,
        serde_json::json!({
            "name": subscription.name,
            "amount": subscription.amount.to_string(),
            "nextBillingDate": encode_time(&subscription.next_billing_date),
        }),
        &subscription.user_id,
    );
    insert_event(conn, &event)
}

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            encode_time(&event.timestamp),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

// ============================================================================
// READS
// ============================================================================

const EXPENSE_COLUMNS: &str = "id, user_id, icon, category, amount, date, created_at";

fn row_to_expense(row: &Row) -> rusqlite::Result<Expense> {
    let amount: String = row.get(4)?;
    let date: String = row.get(5)?;
    let created_at: String = row.get(6)?;

    Ok(Expense {
        id: row.get(0)?,
        user_id: row.get(1)?,
        icon: row.get(2)?,
        category: row.get(3)?,
        amount: decode_amount(4, &amount)?,
        date: decode_time(5, &date)?,
        created_at: decode_time(6, &created_at)?,
    })
}

pub fn get_expense(conn: &Connection, user_id: &str, id: &str) -> Result<Option<Expense>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM expenses WHERE id = ?1 AND user_id = ?2",
        EXPENSE_COLUMNS
    ))?;
    let mut rows = stmt.query_map(params![id, user_id], row_to_expense)?;

    Ok(rows.next().transpose()?)
}

/// All of `user_id`'s expenses, newest first
pub fn list_expenses(conn: &Connection, user_id: &str) -> Result<Vec<Expense>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM expenses WHERE user_id = ?1 ORDER BY date DESC, created_at DESC",
        EXPENSE_COLUMNS
    ))?;

    let expenses = stmt
        .query_map(params![user_id], row_to_expense)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to read expenses")?;

    Ok(expenses)
}

/// Expenses dated within `[start, end]` (inclusive) for `user_id`
pub fn find_by_user_and_date_range(
    conn: &Connection,
    user_id: &str,
    start: &DateTime<Utc>,
    end: &DateTime<Utc>,
) -> Result<Vec<Transaction>> {
    let mut stmt = conn.prepare(
        "SELECT amount, date, category FROM expenses
         WHERE user_id = ?1 AND date >= ?2 AND date <= ?3
         ORDER BY date ASC",
    )?;

    let transactions = stmt
        .query_map(
            params![user_id, encode_time(start), encode_time(end)],
            |row| {
                let amount: String = row.get(0)?;
                let date: String = row.get(1)?;
                Ok(Transaction {
                    amount: decode_amount(0, &amount)?,
                    date: decode_time(1, &date)?,
                    category: row.get(2)?,
                })
            },
        )?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to read expenses in range")?;

    Ok(transactions)
}

pub fn count_expenses(conn: &Connection, user_id: &str) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM expenses WHERE user_id = ?1",
        params![user_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

const SUBSCRIPTION_COLUMNS: &str = "id, user_id, name, amount, next_billing_date, created_at";

fn row_to_subscription(row: &Row) -> rusqlite::Result<Subscription> {
    let amount: String = row.get(3)?;
    let next_billing_date: String = row.get(4)?;
    let created_at: String = row.get(5)?;

    Ok(Subscription {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        amount: decode_amount(3, &amount)?,
        next_billing_date: decode_time(4, &next_billing_date)?,
        created_at: decode_time(5, &created_at)?,
    })
}

pub fn get_subscription(conn: &Connection, user_id: &str, id: &str) -> Result<Option<Subscription>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM subscriptions WHERE id = ?1 AND user_id = ?2",
        SUBSCRIPTION_COLUMNS
    ))?;
    let mut rows = stmt.query_map(params![id, user_id], row_to_subscription)?;

    Ok(rows.next().transpose()?)
}

/// All of `user_id`'s subscriptions, soonest billing first
pub fn list_subscriptions(conn: &Connection, user_id: &str) -> Result<Vec<Subscription>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM subscriptions WHERE user_id = ?1 ORDER BY next_billing_date ASC, created_at ASC",
        SUBSCRIPTION_COLUMNS
    ))?;

    let subscriptions = stmt
        .query_map(params![user_id], row_to_subscription)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to read subscriptions")?;

    Ok(subscriptions)
}

/// Audit trail of one entity as recorded for `actor`, oldest first
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
    actor: &str,
) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2 AND actor = ?3
         ORDER BY id ASC",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id, actor], |row| {
            let timestamp: String = row.get(1)?;
            let data: String = row.get(5)?;
            Ok(Event {
                event_id: row.get(0)?,
                timestamp: decode_time(1, &timestamp)?,
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
                })?,
                actor: row.get(6)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to read events")?;

    Ok(events)
}

// ============================================================================
// CSV IMPORT
// ============================================================================

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "Category")]
    category: Option<String>,
    #[serde(rename = "Amount")]
    amount: Option<Decimal>,
    #[serde(rename = "Date")]
    date: Option<String>,
    #[serde(rename = "Icon", default)]
    icon: Option<String>,
}

/// Read `Category,Amount,Date[,Icon]` rows for `user_id`.
/// Bare dates are midnight in `offset`.
pub fn load_csv(csv_path: &Path, user_id: &str, offset: &FixedOffset) -> Result<Vec<Expense>> {
    let mut rdr = csv::Reader::from_path(csv_path).context("Failed to open CSV file")?;

    let mut expenses = Vec::new();

    for (index, result) in rdr.deserialize::<CsvRow>().enumerate() {
        let line = index + 2;
        let row = result.with_context(|| format!("Failed to parse CSV line {}", line))?;

        let expense = NewExpense {
            icon: row.icon,
            category: row.category,
            amount: row.amount,
            date: row.date,
        }
        .into_expense(user_id, offset)
        .with_context(|| format!("Invalid expense on CSV line {}", line))?;

        expenses.push(expense);
    }

    Ok(expenses)
}
