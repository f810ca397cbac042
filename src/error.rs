// Expense Errors - typed failures surfaced to clients
// Store plumbing uses anyhow; these are the cases a caller can act on.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExpenseError {
    /// Input rejected before it reaches the store
    #[error("{0}")]
    Validation(String),

    /// Record id unknown for this user
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: &'static str,
        identifier: String,
    },

    /// No user identity on the request
    #[error("Not authorized")]
    Unauthorized,
}

impl ExpenseError {
    pub fn missing_fields() -> Self {
        Self::Validation("All fields are required".to_string())
    }

    pub fn expense_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Expense",
            identifier: identifier.into(),
        }
    }

    pub fn subscription_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Subscription",
            identifier: identifier.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            ExpenseError::missing_fields().to_string(),
            "All fields are required"
        );
        assert_eq!(
            ExpenseError::expense_not_found("abc").to_string(),
            "Expense not found: abc"
        );
        assert_eq!(
            ExpenseError::subscription_not_found("xyz").to_string(),
            "Subscription not found: xyz"
        );
        assert!(ExpenseError::expense_not_found("abc").is_not_found());
    }

    #[test]
    fn test_downcast_through_anyhow() {
        let err: anyhow::Error = ExpenseError::Unauthorized.into();
        assert_eq!(
            err.downcast_ref::<ExpenseError>(),
            Some(&ExpenseError::Unauthorized)
        );
    }
}
