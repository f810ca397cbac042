// Category Breakdown - spend totals per category

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::Transaction;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub category: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
    pub count: usize,
}

/// Totals per category, largest first; equal totals ordered by name
pub fn category_breakdown(transactions: &[Transaction]) -> Vec<CategoryTotal> {
    let mut by_category: HashMap<&str, (Decimal, usize)> = HashMap::new();

    for tx in transactions {
        let entry = by_category
            .entry(tx.category.as_str())
            .or_insert((Decimal::ZERO, 0));
        entry.0 = entry.0.saturating_add(tx.amount);
        entry.1 += 1;
    }

    let mut totals: Vec<CategoryTotal> = by_category
        .into_iter()
        .map(|(category, (total, count))| CategoryTotal {
            category: category.to_string(),
            total,
            count,
        })
        .collect();

    totals.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.category.cmp(&b.category)));
    totals
}
