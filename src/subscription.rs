// Subscriptions - recurring charges with a next billing date

use chrono::{DateTime, FixedOffset, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::calendar::same_month;
use crate::error::ExpenseError;
use crate::models::{parse_expense_date, validate_amount};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: String,
    pub user_id: String,
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub next_billing_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Request body for adding a subscription; same wire rules as `NewExpense`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSubscription {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub next_billing_date: Option<String>,
}

impl NewSubscription {
    pub fn into_subscription(self, user_id: &str, offset: &FixedOffset) -> Result<Subscription, ExpenseError> {
        let name = self
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .ok_or_else(ExpenseError::missing_fields)?;
        let amount = self.amount.ok_or_else(ExpenseError::missing_fields)?;
        let raw_date = self
            .next_billing_date
            .filter(|d| !d.trim().is_empty())
            .ok_or_else(ExpenseError::missing_fields)?;

        Ok(Subscription {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            name,
            amount: validate_amount(amount)?,
            next_billing_date: parse_expense_date(raw_date.trim(), offset)?,
            created_at: Utc::now(),
        })
    }
}

// ============================================================================
// UPCOMING CHARGES
// ============================================================================

/// Subscriptions still to bill this month, and what they add up to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpcomingCharges {
    pub subscriptions: Vec<Subscription>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
}

/// Subscriptions whose billing date is today or later in `now`'s month.
/// Dates are compared as calendar days in `now`'s offset.
pub fn due_this_month(subscriptions: &[Subscription], now: &DateTime<FixedOffset>) -> UpcomingCharges {
    let today = now.date_naive();

    let due: Vec<Subscription> = subscriptions
        .iter()
        .filter(|s| same_month(&s.next_billing_date, now))
        .filter(|s| s.next_billing_date.with_timezone(now.offset()).date_naive() >= today)
        .cloned()
        .collect();

    let total = due
        .iter()
        .fold(Decimal::ZERO, |sum, s| sum.saturating_add(s.amount));

    UpcomingCharges {
        subscriptions: due,
        total,
    }
}
