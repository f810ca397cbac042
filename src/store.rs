// Transaction Store - the read seam the forecast depends on, plus the SQLite-backed store

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::db;
use crate::error::ExpenseError;
use crate::models::{Event, Expense, Transaction};
use crate::subscription::Subscription;

/// Read capability the forecast needs: a user's spend in an inclusive window
pub trait TransactionStore {
    fn find_by_user_and_date_range(
        &self,
        user_id: &str,
        start: &DateTime<Utc>,
        end: &DateTime<Utc>,
    ) -> Result<Vec<Transaction>>;
}

/// SQLite store shared across request handlers
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database file and ensure the schema exists
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        db::setup_database(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| anyhow!("database lock poisoned"))
    }

    pub fn add_expense(&self, expense: &Expense) -> Result<()> {
        let conn = self.lock()?;
        db::insert_expense(&conn, expense)
    }

    pub fn list_expenses(&self, user_id: &str) -> Result<Vec<Expense>> {
        let conn = self.lock()?;
        db::list_expenses(&conn, user_id)
    }

    pub fn delete_expense(&self, user_id: &str, id: &str) -> Result<Expense> {
        let conn = self.lock()?;
        db::delete_expense(&conn, user_id, id)
    }

    pub fn import_expenses(&self, expenses: &[Expense]) -> Result<db::ImportSummary> {
        let conn = self.lock()?;
        db::import_expenses(&conn, expenses)
    }

    pub fn count_expenses(&self, user_id: &str) -> Result<i64> {
        let conn = self.lock()?;
        db::count_expenses(&conn, user_id)
    }

    /// Audit trail of one expense, including after it was deleted.
    /// Unknown ids and other users' expenses are both NotFound.
    pub fn expense_history(&self, user_id: &str, id: &str) -> Result<Vec<Event>> {
        let conn = self.lock()?;
        let events = db::get_events_for_entity(&conn, "expense", id, user_id)?;
        if events.is_empty() {
            return Err(ExpenseError::expense_not_found(id).into());
        }
        Ok(events)
    }

    pub fn add_subscription(&self, subscription: &Subscription) -> Result<()> {
        let conn = self.lock()?;
        db::insert_subscription(&conn, subscription)
    }

    pub fn list_subscriptions(&self, user_id: &str) -> Result<Vec<Subscription>> {
        let conn = self.lock()?;
        db::list_subscriptions(&conn, user_id)
    }

    pub fn delete_subscription(&self, user_id: &str, id: &str) -> Result<Subscription> {
        let conn = self.lock()?;
        db::delete_subscription(&conn, user_id, id)
    }
}

impl TransactionStore for SqliteStore {
    fn find_by_user_and_date_range(
        &self,
        user_id: &str,
        start: &DateTime<Utc>,
        end: &DateTime<Utc>,
    ) -> Result<Vec<Transaction>> {
        let conn = self.lock()?;
        db::find_by_user_and_date_range(&conn, user_id, start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewExpense;
    use chrono::{FixedOffset, TimeZone};
    use rust_decimal_macros::dec;

    #[test]
    fn test_store_round_trip_through_trait() {
        let store = SqliteStore::open_in_memory().unwrap();
        let expense = NewExpense {
            icon: None,
            category: Some("Food".into()),
            amount: Some(dec!(8.25)),
            date: Some("2024-03-03".into()),
        }
        .into_expense("alice", &FixedOffset::east_opt(0).unwrap())
        .unwrap();
        store.add_expense(&expense).unwrap();

        let reader: &dyn TransactionStore = &store;
        let found = reader
            .find_by_user_and_date_range(
                "alice",
                &Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
                &Utc.with_ymd_and_hms(2024, 3, 31, 0, 0, 0).unwrap(),
            )
            .unwrap();

        assert_eq!(found, vec![expense.to_transaction()]);
    }

    #[test]
    fn test_file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("expenses.db");
        let expense = NewExpense {
            icon: Some("cart".into()),
            category: Some("Groceries".into()),
            amount: Some(dec!(42)),
            date: Some("2024-05-10".into()),
        }
        .into_expense("alice", &FixedOffset::east_opt(0).unwrap())
        .unwrap();

        SqliteStore::open(&path).unwrap().add_expense(&expense).unwrap();

        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.count_expenses("alice").unwrap(), 1);
        assert_eq!(reopened.list_expenses("alice").unwrap()[0].icon.as_deref(), Some("cart"));
    }

    #[test]
    fn test_history_survives_delete_and_is_owner_only() {
        let store = SqliteStore::open_in_memory().unwrap();
        let expense = NewExpense {
            icon: None,
            category: Some("Food".into()),
            amount: Some(dec!(5)),
            date: Some("2024-03-03".into()),
        }
        .into_expense("alice", &FixedOffset::east_opt(0).unwrap())
        .unwrap();
        store.add_expense(&expense).unwrap();
        store.delete_expense("alice", &expense.id).unwrap();

        let history = store.expense_history("alice", &expense.id).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].event_type, "expense_deleted");

        let err = store.expense_history("bob", &expense.id).unwrap_err();
        assert!(err.downcast_ref::<ExpenseError>().unwrap().is_not_found());
    }
}
