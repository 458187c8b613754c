//! Chat Context
//!
//! Read-only snapshot of the user's financial data, supplied by the host
//! application for every question. Skills read it; nothing in this crate
//! mutates it.

use anyhow::{Context as _, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Financial snapshot passed into the cascade
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatContext {
    pub user_profile: Option<UserProfile>,
    pub accounts: Vec<Account>,
    pub budgets: Vec<Budget>,
    pub goals: Vec<Goal>,
    pub transactions: Vec<Transaction>,
    pub recurring_expenses: Vec<RecurringExpense>,
    pub locale: Option<String>,
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Net monthly income, if the user shared it
    #[serde(default)]
    pub monthly_income: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    #[default]
    Checking,
    Savings,
    Credit,
    Investment,
    Cash,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub kind: AccountKind,
    pub balance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetPeriod {
    Weekly,
    #[default]
    Monthly,
    Yearly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Budget {
    pub id: String,
    pub category: String,
    pub limit: f64,
    #[serde(default)]
    pub spent: f64,
    #[serde(default)]
    pub period: BudgetPeriod,
}

impl Budget {
    pub fn remaining(&self) -> f64 {
        self.limit - self.spent
    }

    pub fn is_over(&self) -> bool {
        self.spent > self.limit
    }

    /// Fraction of the limit already spent (0.0 for a zero limit)
    pub fn utilization(&self) -> f64 {
        if self.limit <= 0.0 {
            0.0
        } else {
            self.spent / self.limit
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub id: String,
    pub name: String,
    pub target_amount: f64,
    #[serde(default)]
    pub current_amount: f64,
    #[serde(default)]
    pub target_date: Option<NaiveDate>,
}

impl Goal {
    /// Progress as a percentage, capped at 100
    pub fn percent_complete(&self) -> f64 {
        if self.target_amount <= 0.0 {
            return 100.0;
        }
        (self.current_amount / self.target_amount * 100.0).clamp(0.0, 100.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub date: NaiveDate,
    /// Negative for money leaving the account
    pub amount: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub merchant: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Weekly,
    #[default]
    Monthly,
    Quarterly,
    Yearly,
}

impl Frequency {
    /// Multiplier that converts one charge into a monthly amount
    pub fn monthly_factor(&self) -> f64 {
        match self {
            Frequency::Weekly => 52.0 / 12.0,
            Frequency::Monthly => 1.0,
            Frequency::Quarterly => 1.0 / 3.0,
            Frequency::Yearly => 1.0 / 12.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurringExpense {
    pub id: String,
    pub name: String,
    pub amount: f64,
    #[serde(default)]
    pub frequency: Frequency,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub next_due: Option<NaiveDate>,
}

impl RecurringExpense {
    pub fn monthly_cost(&self) -> f64 {
        self.amount.abs() * self.frequency.monthly_factor()
    }
}

impl ChatContext {
    /// Parse a context snapshot from JSON
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse chat context")
    }

    /// Load a context snapshot from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read context file {:?}", path))?;
        Self::from_json_str(&content)
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_profile.as_ref().map(|p| p.id.as_str())
    }

    pub fn currency_code(&self) -> &str {
        self.currency.as_deref().unwrap_or("USD")
    }

    /// Sum of all account balances (credit balances are expected negative)
    pub fn total_balance(&self) -> f64 {
        self.accounts.iter().map(|a| a.balance).sum()
    }

    pub fn savings_balance(&self) -> f64 {
        self.accounts
            .iter()
            .filter(|a| a.kind == AccountKind::Savings)
            .map(|a| a.balance)
            .sum()
    }

    /// Recurring expenses normalised to a monthly figure
    pub fn monthly_recurring_total(&self) -> f64 {
        self.recurring_expenses.iter().map(|r| r.monthly_cost()).sum()
    }

    /// Outflows grouped by category, largest first
    pub fn outflows_by_category(&self) -> Vec<(String, f64)> {
        let mut totals: BTreeMap<String, f64> = BTreeMap::new();
        for tx in self.transactions.iter().filter(|t| t.amount < 0.0) {
            let category = tx
                .category
                .clone()
                .unwrap_or_else(|| "Uncategorized".to_string());
            *totals.entry(category).or_default() += -tx.amount;
        }

        let mut sorted: Vec<_> = totals.into_iter().collect();
        sorted.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        sorted
    }

    pub fn latest_transaction_date(&self) -> Option<NaiveDate> {
        self.transactions.iter().map(|t| t.date).max()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
            && self.budgets.is_empty()
            && self.goals.is_empty()
            && self.transactions.is_empty()
            && self.recurring_expenses.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ChatContext {
        ChatContext::from_json_str(
            r#"{
                "userProfile": { "id": "u-1", "monthlyIncome": 4000 },
                "accounts": [
                    { "id": "a1", "name": "Checking", "kind": "checking", "balance": 1200.5 },
                    { "id": "a2", "name": "Rainy day", "kind": "savings", "balance": 5000 }
                ],
                "transactions": [
                    { "id": "t1", "date": "2026-09-01", "amount": -40, "category": "Dining" },
                    { "id": "t2", "date": "2026-09-03", "amount": -120, "category": "Groceries" },
                    { "id": "t3", "date": "2026-09-04", "amount": -25, "category": "Dining" },
                    { "id": "t4", "date": "2026-09-05", "amount": 4000, "category": "Salary" }
                ],
                "recurringExpenses": [
                    { "id": "r1", "name": "Gym", "amount": 30, "frequency": "monthly" },
                    { "id": "r2", "name": "Cloud", "amount": 120, "frequency": "yearly" }
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_parse_defaults_missing_collections() {
        let ctx = ChatContext::from_json_str(r#"{ "currency": "EUR" }"#).unwrap();
        assert!(ctx.is_empty());
        assert_eq!(ctx.currency_code(), "EUR");
        assert!(ctx.user_id().is_none());
    }

    #[test]
    fn test_balances() {
        let ctx = sample();
        assert!((ctx.total_balance() - 6200.5).abs() < 1e-9);
        assert_eq!(ctx.savings_balance(), 5000.0);
    }

    #[test]
    fn test_outflows_by_category_sorted() {
        let ctx = sample();
        let outflows = ctx.outflows_by_category();
        assert_eq!(outflows[0], ("Groceries".to_string(), 120.0));
        assert_eq!(outflows[1], ("Dining".to_string(), 65.0));
        assert_eq!(outflows.len(), 2);
    }

    #[test]
    fn test_monthly_recurring_total() {
        let ctx = sample();
        assert!((ctx.monthly_recurring_total() - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_goal_percent_capped() {
        let goal = Goal {
            id: "g".into(),
            name: "Trip".into(),
            target_amount: 100.0,
            current_amount: 250.0,
            target_date: None,
        };
        assert_eq!(goal.percent_complete(), 100.0);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ctx.json");
        std::fs::write(&path, r#"{ "budgets": [ { "id": "b", "category": "Fun", "limit": 50 } ] }"#)
            .unwrap();

        let ctx = ChatContext::load(&path).unwrap();
        assert_eq!(ctx.budgets.len(), 1);
        assert_eq!(ctx.budgets[0].spent, 0.0);
    }
}
