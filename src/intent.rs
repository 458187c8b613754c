//! Intent Classifier
//!
//! Coarse, rule-based pre-filter for incoming questions. Rules are evaluated
//! in order and the first match wins; anything else is `GeneralQa`.
//! This is not how skills are matched (each skill owns its own predicate).

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Coarse question intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Balance,
    BudgetStatus,
    Subscriptions,
    Categorize,
    Forecast,
    CreateBudget,
    GoalProgress,
    SpendingBreakdown,
    GeneralQa,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Balance => "balance",
            Intent::BudgetStatus => "budget_status",
            Intent::Subscriptions => "subscriptions",
            Intent::Categorize => "categorize",
            Intent::Forecast => "forecast",
            Intent::CreateBudget => "create_budget",
            Intent::GoalProgress => "goal_progress",
            Intent::SpendingBreakdown => "spending_breakdown",
            Intent::GeneralQa => "general_qa",
        }
    }

    /// Whether the intent can be answered from the user's own data
    pub fn is_grounded(&self) -> bool {
        !matches!(self, Intent::GeneralQa)
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// Order matters: earlier rules shadow later ones.
static RULES: Lazy<Vec<(Intent, Regex)>> = Lazy::new(|| {
    [
        (
            Intent::Balance,
            r"(?i)\b(balance|how much (money )?(do i have|is in)|net worth|account total)\b",
        ),
        (
            Intent::BudgetStatus,
            r"(?i)\b(budget status|over budget|on track|budget left|left in my budget|how('s| is| are) my budgets?)\b",
        ),
        (
            Intent::Subscriptions,
            r"(?i)\b(subscriptions?|recurring (charges?|payments?|expenses?)|memberships?)\b",
        ),
        (
            Intent::Categorize,
            r"(?i)\b(categori[sz]e|recategori[sz]e|what category|which category)\b",
        ),
        (
            Intent::Forecast,
            r"(?i)\b(forecast|projection|project(ed)?|end of (the )?month|will i have|next month)\b",
        ),
        (
            Intent::CreateBudget,
            r"(?i)\b(create|make|set up|start|add)\b.*\bbudget\b",
        ),
        (
            Intent::GoalProgress,
            r"(?i)\b(goals?|saving (up )?for|progress)\b",
        ),
        (
            Intent::SpendingBreakdown,
            r"(?i)\b(spend|spent|spending|expenses|where (did|does) my money go)\b",
        ),
    ]
    .into_iter()
    .filter_map(|(intent, pattern)| Regex::new(pattern).ok().map(|re| (intent, re)))
    .collect()
});

/// Classify a question into a coarse intent
pub fn detect_intent(text: &str) -> Intent {
    RULES
        .iter()
        .find(|(_, re)| re.is_match(text))
        .map(|(intent, _)| *intent)
        .unwrap_or(Intent::GeneralQa)
}
