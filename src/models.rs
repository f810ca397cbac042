// Expense Models - stored records and the read-only view the forecast consumes

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ExpenseError;

// ============================================================================
// TRANSACTION (forecast input)
// ============================================================================

/// One spend record as seen by the forecast and chart code.
/// Never mutated once read from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub date: DateTime<Utc>,
    pub category: String,
}

impl Transaction {
    pub fn new(amount: Decimal, date: DateTime<Utc>, category: impl Into<String>) -> Self {
        Self {
            amount,
            date,
            category: category.into(),
        }
    }
}

// ============================================================================
// EXPENSE (stored record)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    /// Stable identity (UUID v4)
    pub id: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub category: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Expense {
    /// Hash used to skip rows already imported for the same user.
    /// Identity is `id`; this is only for deduplication.
    pub fn compute_idempotency_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!(
            "{}|{}|{}|{}",
            self.user_id,
            self.date.to_rfc3339(),
            self.amount.normalize(),
            self.category
        ));
        format!("{:x}", hasher.finalize())
    }

    pub fn to_transaction(&self) -> Transaction {
        Transaction::new(self.amount, self.date, self.category.clone())
    }
}

/// Request body for adding an expense.
/// Every field is optional at the wire level so a missing one is reported
/// as a validation failure rather than a decode error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewExpense {
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub date: Option<String>,
}

impl NewExpense {
    /// Validate and turn into a storable record for `user_id`.
    ///
    /// Plain `YYYY-MM-DD` dates mean midnight in `offset`, the calendar zone
    /// the forecast uses, so they land on the same day-of-month the user picked.
    pub fn into_expense(self, user_id: &str, offset: &FixedOffset) -> Result<Expense, ExpenseError> {
        let category = self
            .category
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(ExpenseError::missing_fields)?;
        let amount = self.amount.ok_or_else(ExpenseError::missing_fields)?;
        let raw_date = self
            .date
            .filter(|d| !d.trim().is_empty())
            .ok_or_else(ExpenseError::missing_fields)?;

        let amount = validate_amount(amount)?;
        let date = parse_expense_date(raw_date.trim(), offset)?;

        Ok(Expense {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            icon: self.icon.filter(|i| !i.is_empty()),
            category,
            amount,
            date,
            created_at: Utc::now(),
        })
    }
}

/// Largest single amount accepted. Keeps month totals and projections far
/// from `Decimal::MAX` however many rows a user stores.
pub fn max_amount() -> Decimal {
    Decimal::from(1_000_000_000u32)
}

/// Amounts must be positive and at most `max_amount()`
pub fn validate_amount(amount: Decimal) -> Result<Decimal, ExpenseError> {
    if amount <= Decimal::ZERO {
        return Err(ExpenseError::Validation(
            "Amount should be a valid number greater than 0".to_string(),
        ));
    }
    if amount > max_amount() {
        return Err(ExpenseError::Validation(format!(
            "Amount should not exceed {}",
            max_amount()
        )));
    }
    Ok(amount)
}

/// Accepts RFC 3339 instants or bare calendar dates
pub fn parse_expense_date(raw: &str, offset: &FixedOffset) -> Result<DateTime<Utc>, ExpenseError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| ExpenseError::Validation(format!("Invalid date: {}", raw)))?;
    let local_midnight = date.and_time(NaiveTime::MIN);

    offset
        .from_local_datetime(&local_midnight)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| ExpenseError::Validation(format!("Invalid date: {}", raw)))
}

// ============================================================================
// AUDIT EVENT
// ============================================================================

/// Every change to an expense or subscription is recorded as an event
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}
